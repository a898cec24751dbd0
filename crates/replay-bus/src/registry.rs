//! # Subscriber Registry
//!
//! Copy-on-write array of live handles. Mutations swap a freshly built
//! immutable `Vec` in with a compare-and-swap retry loop; readers snapshot
//! for free. Two distinct empty instances keep "nobody yet" apart from
//! "terminated for good": `try_add` refuses on the sealed instance only.

use crate::handle::HandleInner;
use arc_swap::ArcSwap;
use std::sync::Arc;

type Handles<T> = Vec<Arc<HandleInner<T>>>;

pub(crate) struct Registry<T: Clone> {
    handles: ArcSwap<Handles<T>>,
    /// "No subscribers yet" sentinel; also what an emptied registry returns to.
    empty: Arc<Handles<T>>,
    /// "Terminated" sentinel; pointer-distinct from `empty`.
    sealed: Arc<Handles<T>>,
}

impl<T: Clone> Registry<T> {
    pub(crate) fn new() -> Self {
        let empty: Arc<Handles<T>> = Arc::new(Vec::new());
        Self {
            handles: ArcSwap::from(Arc::clone(&empty)),
            empty,
            sealed: Arc::new(Vec::new()),
        }
    }

    /// Adds a handle, or refuses with `false` if the registry is sealed.
    pub(crate) fn try_add(&self, handle: &Arc<HandleInner<T>>) -> bool {
        loop {
            let current = self.handles.load_full();
            if Arc::ptr_eq(&current, &self.sealed) {
                return false;
            }
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().map(Arc::clone));
            next.push(Arc::clone(handle));
            let prev = self.handles.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*prev, &current) {
                return true;
            }
        }
    }

    /// Removes a handle by identity; a no-op if it is not present.
    pub(crate) fn remove(&self, handle: &Arc<HandleInner<T>>) {
        loop {
            let current = self.handles.load_full();
            if !current.iter().any(|other| Arc::ptr_eq(other, handle)) {
                return;
            }
            let next = if current.len() == 1 {
                Arc::clone(&self.empty)
            } else {
                Arc::new(
                    current
                        .iter()
                        .filter(|other| !Arc::ptr_eq(*other, handle))
                        .map(Arc::clone)
                        .collect(),
                )
            };
            let prev = self.handles.compare_and_swap(&current, next);
            if Arc::ptr_eq(&*prev, &current) {
                return;
            }
        }
    }

    /// Swaps in the sealed sentinel and returns the final set of live
    /// handles. A second seal returns an empty set.
    pub(crate) fn seal(&self) -> Arc<Handles<T>> {
        let prev = self.handles.swap(Arc::clone(&self.sealed));
        if Arc::ptr_eq(&prev, &self.sealed) {
            Arc::clone(&self.empty)
        } else {
            prev
        }
    }

    pub(crate) fn is_sealed(&self) -> bool {
        Arc::ptr_eq(&*self.handles.load(), &self.sealed)
    }

    /// Current live handles; cheap, lock-free.
    pub(crate) fn snapshot(&self) -> Arc<Handles<T>> {
        self.handles.load_full()
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.load().len()
    }
}
