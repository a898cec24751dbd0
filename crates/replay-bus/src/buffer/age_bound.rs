//! # Age-Bound Buffer
//!
//! Linked chain capped by count and by entry age. Appends apply the size
//! rule first, then walk the head past everything stale. Reads filter by age
//! without touching the shared head, so an idle buffer still presents a
//! fresh view between appends. Termination purges stale entries one last
//! time and freezes the chain; age never shrinks the view again after that.

use super::node::{self, ChainNode};
use super::{Entry, ReplayBuffer};
use crate::clock::Clock;
use crate::handle::HandleInner;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) struct AgeBoundBuffer<T> {
    max_len: usize,
    max_age_millis: u64,
    clock: Arc<dyn Clock>,
    head: ArcSwap<ChainNode<T>>,
    tail: ArcSwap<ChainNode<T>>,
    /// Producer-side trim accounting; readers count the chain instead.
    count: AtomicUsize,
}

impl<T> AgeBoundBuffer<T> {
    pub(crate) fn new(max_len: usize, max_age_millis: u64, clock: Arc<dyn Clock>) -> Self {
        let origin = Arc::new(ChainNode::origin());
        Self {
            max_len,
            max_age_millis,
            clock,
            head: ArcSwap::from(Arc::clone(&origin)),
            tail: ArcSwap::from(origin),
            count: AtomicUsize::new(0),
        }
    }

    /// Whether `stamp` has aged out at `now`. Exact equality expires: an
    /// entry of age `max_age` is already gone. Terminal stamps are
    /// `u64::MAX`, which this can never classify as expired.
    fn expired(&self, stamp: u64, now: u64) -> bool {
        stamp.saturating_add(self.max_age_millis) <= now
    }

    fn splice(&self, node: Arc<ChainNode<T>>) {
        let tail = self.tail.load_full();
        tail.link(Arc::clone(&node));
        self.tail.store(node);
    }

    fn trim_overflow(&self) {
        if self.count.fetch_add(1, Ordering::Relaxed) + 1 > self.max_len {
            self.count.fetch_sub(1, Ordering::Relaxed);
            let head = self.head.load_full();
            if let Some(next) = head.next() {
                self.head.store(Arc::clone(next));
            }
        }
    }

    /// Advances the shared head past expired entries. Producer-only.
    fn trim_expired(&self, now: u64) {
        let mut head = self.head.load_full();
        let mut advanced = false;
        loop {
            let Some(next) = head.next() else { break };
            if !self.expired(next.stamp, now) {
                break;
            }
            let next = Arc::clone(next);
            head = next;
            advanced = true;
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
        if advanced {
            self.head.store(head);
        }
    }

    /// Terminal entry present means the view is frozen.
    fn is_done(&self) -> bool {
        self.tail
            .load_full()
            .value
            .as_ref()
            .is_some_and(Entry::is_terminal)
    }

    /// Where a brand-new cursor begins: the shared head, aged forward while
    /// the bus is live. Never moves the shared head itself.
    fn start_node(&self) -> Arc<ChainNode<T>> {
        let mut node = self.head.load_full();
        if self.is_done() {
            return node;
        }
        let now = self.clock.now_millis();
        loop {
            let Some(next) = node.next() else { break };
            if !self.expired(next.stamp, now) {
                break;
            }
            let next = Arc::clone(next);
            node = next;
        }
        node
    }
}

impl<T: Clone + Send + Sync> ReplayBuffer<T> for AgeBoundBuffer<T> {
    fn append(&self, item: T) {
        let now = self.clock.now_millis();
        self.splice(Arc::new(ChainNode::new(Entry::Item(item), now)));
        self.trim_overflow();
        self.trim_expired(now);
    }

    fn append_terminal(&self, entry: Entry<T>) {
        self.splice(Arc::new(ChainNode::new(entry, u64::MAX)));
        // One final purge; the size rule is deliberately not reapplied.
        self.trim_expired(self.clock.now_millis());
    }

    fn len(&self) -> usize {
        node::count_items(&self.start_node())
    }

    fn peek_last(&self) -> Option<T> {
        node::last_item(&self.start_node())
    }

    fn snapshot_into(&self, dest: &mut Vec<T>) {
        dest.clear();
        node::collect_items(&self.start_node(), dest);
    }

    fn replay_for(&self, handle: &HandleInner<T>) {
        node::drain_chain(handle, || self.start_node());
    }
}
