//! # Subscription Handle
//!
//! One handle per attached subscriber. The handle owns the subscriber's
//! replay cursor and the counter implementing the single-flight drain
//! protocol: any thread may signal work, exactly one drains at a time.

use crate::buffer::node::ChainNode;
use crate::bus::BusState;
use crate::subscriber::Subscriber;
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Shared per-subscriber state.
///
/// The cursor comes in two shapes and each buffer uses its own: counting
/// buffers track an absolute `position`, chain buffers pin the last-consumed
/// [`ChainNode`]. Whichever is in use, it is only ever touched by the thread
/// currently holding the drain claim.
pub(crate) struct HandleInner<T: Clone> {
    pub(crate) subscriber: Arc<dyn Subscriber<T>>,
    bus: Weak<BusState<T>>,
    cancelled: AtomicBool,
    /// Signalled-but-undrained count; nonzero means a drain is in flight.
    pending: AtomicUsize,
    /// Absolute replay position for counting buffers.
    position: AtomicUsize,
    /// Last consumed node for chain buffers.
    node: ArcSwapOption<ChainNode<T>>,
}

impl<T: Clone> HandleInner<T> {
    pub(crate) fn new(subscriber: Arc<dyn Subscriber<T>>, bus: Weak<BusState<T>>) -> Self {
        Self {
            subscriber,
            bus,
            cancelled: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            position: AtomicUsize::new(0),
            node: ArcSwapOption::const_empty(),
        }
    }

    /// Signals work and tries to take the drain claim.
    ///
    /// Returns true iff the caller is now the draining thread. A false return
    /// means the current drainer has been signalled and will pick the new
    /// work up before it releases.
    pub(crate) fn try_claim_drain(&self) -> bool {
        self.pending.fetch_add(1, Ordering::AcqRel) == 0
    }

    /// Retires `missed` processed signals, returning the signals that arrived
    /// in the meantime. The drainer loops until this reaches zero; cursor
    /// writes made before the release are visible to whoever claims next.
    pub(crate) fn release_drain(&self, missed: usize) -> usize {
        self.pending.fetch_sub(missed, Ordering::AcqRel) - missed
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Marks the handle cancelled, returning true iff it was active before.
    pub(crate) fn mark_cancelled(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    pub(crate) fn set_position(&self, position: usize) {
        self.position.store(position, Ordering::Relaxed);
    }

    pub(crate) fn node(&self) -> Option<Arc<ChainNode<T>>> {
        self.node.load_full()
    }

    pub(crate) fn set_node(&self, node: Option<Arc<ChainNode<T>>>) {
        self.node.store(node);
    }

    /// Drops the cursor's pin on the chain so cancelled subscribers do not
    /// keep evicted history alive.
    pub(crate) fn clear_cursor(&self) {
        self.node.store(None);
    }
}

/// Control surface handed to a subscriber at attach time.
///
/// Clones all control the same attachment. Dropping a subscription does
/// not cancel it; delivery continues until [`cancel`](Self::cancel) is
/// called or the bus terminates.
pub struct Subscription<T: Clone> {
    inner: Arc<HandleInner<T>>,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(inner: Arc<HandleInner<T>>) -> Self {
        Self { inner }
    }

    /// Detaches the subscriber. Idempotent; concurrent deliveries already in
    /// flight may still land, nothing new begins afterwards.
    pub fn cancel(&self) {
        if self.inner.mark_cancelled() {
            if let Some(bus) = self.inner.bus.upgrade() {
                bus.remove_handle(&self.inner);
            }
            self.inner.clear_cursor();
        }
    }

    /// Whether this attachment has been detached, by an explicit
    /// [`cancel`](Self::cancel) or because its terminal callback has been
    /// delivered.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

impl<T: Clone> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
