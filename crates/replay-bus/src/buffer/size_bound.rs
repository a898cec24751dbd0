//! # Size-Bound Buffer
//!
//! Linked chain capped at `max_len` live items. Every overflowing append
//! advances the shared head past exactly one node; cursors already inside
//! the chain keep their own references and are untouched by the trim.

use super::node::{self, ChainNode};
use super::{Entry, ReplayBuffer};
use crate::handle::HandleInner;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) struct SizeBoundBuffer<T> {
    max_len: usize,
    /// Earliest node visible to a brand-new subscriber. The node in this
    /// slot is a placeholder; its own value is never replayed.
    head: ArcSwap<ChainNode<T>>,
    /// Splice point for the next append. Only the producer follows it.
    tail: ArcSwap<ChainNode<T>>,
    /// Producer-side trim accounting; readers count the chain instead.
    count: AtomicUsize,
}

impl<T> SizeBoundBuffer<T> {
    pub(crate) fn new(max_len: usize) -> Self {
        let origin = Arc::new(ChainNode::origin());
        Self {
            max_len,
            head: ArcSwap::from(Arc::clone(&origin)),
            tail: ArcSwap::from(origin),
            count: AtomicUsize::new(0),
        }
    }

    fn splice(&self, node: Arc<ChainNode<T>>) {
        let tail = self.tail.load_full();
        tail.link(Arc::clone(&node));
        self.tail.store(node);
    }

    fn trim(&self) {
        if self.count.fetch_add(1, Ordering::Relaxed) + 1 > self.max_len {
            self.count.fetch_sub(1, Ordering::Relaxed);
            let head = self.head.load_full();
            if let Some(next) = head.next() {
                self.head.store(Arc::clone(next));
            }
        }
    }
}

impl<T: Clone + Send + Sync> ReplayBuffer<T> for SizeBoundBuffer<T> {
    fn append(&self, item: T) {
        self.splice(Arc::new(ChainNode::new(Entry::Item(item), 0)));
        self.trim();
    }

    fn append_terminal(&self, entry: Entry<T>) {
        self.splice(Arc::new(ChainNode::new(entry, u64::MAX)));
    }

    fn len(&self) -> usize {
        node::count_items(&self.head.load_full())
    }

    fn peek_last(&self) -> Option<T> {
        node::last_item(&self.head.load_full())
    }

    fn snapshot_into(&self, dest: &mut Vec<T>) {
        dest.clear();
        node::collect_items(&self.head.load_full(), dest);
    }

    fn replay_for(&self, handle: &HandleInner<T>) {
        node::drain_chain(handle, || self.head.load_full());
    }
}
