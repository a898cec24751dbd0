//! # Chain Nodes
//!
//! Singly linked, forward-only storage for the bounded strategies. Each node
//! is shared-owned by its predecessor's link and by every subscriber cursor
//! currently pinned to it, so advancing the logical head never invalidates a
//! cursor mid-chain: trimmed nodes stay alive exactly as long as someone can
//! still walk through them.

use super::Entry;
use crate::handle::HandleInner;
use std::sync::{Arc, OnceLock};

/// Link in a replay chain.
///
/// `value` is `None` only for the origin node a chain starts with. A node in
/// head position acts as a placeholder: walks read values strictly through
/// `next`, never from the node they stand on.
pub(crate) struct ChainNode<T> {
    pub(crate) value: Option<Entry<T>>,
    /// Append timestamp for age-bound chains; terminal entries carry
    /// `u64::MAX` so age trims can never walk past them.
    pub(crate) stamp: u64,
    next: OnceLock<Arc<ChainNode<T>>>,
}

impl<T> ChainNode<T> {
    pub(crate) fn origin() -> Self {
        Self {
            value: None,
            stamp: 0,
            next: OnceLock::new(),
        }
    }

    pub(crate) fn new(entry: Entry<T>, stamp: u64) -> Self {
        Self {
            value: Some(entry),
            stamp,
            next: OnceLock::new(),
        }
    }

    /// Successor, if one has been linked yet.
    pub(crate) fn next(&self) -> Option<&Arc<ChainNode<T>>> {
        self.next.get()
    }

    /// Links the successor. Appends are serialized, so the slot is empty
    /// whenever this runs; a lost race would leave the first link in place.
    pub(crate) fn link(&self, next: Arc<ChainNode<T>>) {
        let _ = self.next.set(next);
    }
}

// Unwinds the chain iteratively; the default recursive drop would overflow
// the stack on long histories.
impl<T> Drop for ChainNode<T> {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_still_shared) => break,
            }
        }
    }
}

/// Counts live items reachable behind `start`, stopping at the terminal.
pub(crate) fn count_items<T>(start: &Arc<ChainNode<T>>) -> usize {
    let mut node = Arc::clone(start);
    let mut count = 0;
    loop {
        let Some(next) = node.next() else { break };
        let next = Arc::clone(next);
        match next.value {
            Some(Entry::Item(_)) => count += 1,
            Some(_) => break,
            None => {}
        }
        node = next;
    }
    count
}

/// Appends every live item behind `start` to `dest`, oldest first.
pub(crate) fn collect_items<T: Clone>(start: &Arc<ChainNode<T>>, dest: &mut Vec<T>) {
    let mut node = Arc::clone(start);
    loop {
        let Some(next) = node.next() else { break };
        let next = Arc::clone(next);
        match next.value {
            Some(Entry::Item(ref item)) => dest.push(item.clone()),
            Some(_) => break,
            None => {}
        }
        node = next;
    }
}

/// Newest live item behind `start`, cloned once.
pub(crate) fn last_item<T: Clone>(start: &Arc<ChainNode<T>>) -> Option<T> {
    let mut node = Arc::clone(start);
    let mut newest: Option<Arc<ChainNode<T>>> = None;
    loop {
        let Some(next) = node.next() else { break };
        let next = Arc::clone(next);
        match next.value {
            Some(Entry::Item(_)) => newest = Some(Arc::clone(&next)),
            Some(_) => break,
            None => {}
        }
        node = next;
    }
    newest.and_then(|node| match node.value {
        Some(Entry::Item(ref item)) => Some(item.clone()),
        _ => None,
    })
}

/// Drain loop over a chain for one handle.
///
/// Claims the handle, walks forward from its cursor (or from `fresh_start`
/// for a first-time subscriber), delivers, then parks the cursor and
/// releases. Terminal delivery marks the handle cancelled and, like
/// cancellation, exits without releasing, permanently parking the claim
/// counter.
pub(crate) fn drain_chain<T, F>(handle: &HandleInner<T>, fresh_start: F)
where
    T: Clone,
    F: FnOnce() -> Arc<ChainNode<T>>,
{
    if !handle.try_claim_drain() {
        return;
    }
    let mut missed = 1;
    let mut node = match handle.node() {
        Some(node) => node,
        None => fresh_start(),
    };
    loop {
        loop {
            if handle.is_cancelled() {
                handle.clear_cursor();
                return;
            }
            let Some(next) = node.next() else { break };
            let next = Arc::clone(next);
            match next.value {
                Some(Entry::Item(ref item)) => handle.subscriber.on_item(item.clone()),
                Some(Entry::Complete) => {
                    handle.subscriber.on_complete();
                    handle.clear_cursor();
                    handle.mark_cancelled();
                    return;
                }
                Some(Entry::Fail(ref failure)) => {
                    handle.subscriber.on_error(Arc::clone(failure));
                    handle.clear_cursor();
                    handle.mark_cancelled();
                    return;
                }
                None => {}
            }
            node = next;
        }
        handle.set_node(Some(Arc::clone(&node)));
        missed = handle.release_drain(missed);
        if missed == 0 {
            return;
        }
    }
}
