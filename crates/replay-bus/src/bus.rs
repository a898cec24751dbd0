//! # Bus Core
//!
//! Ties the three moving parts together: one replay buffer, one
//! copy-on-write registry, one terminal cell. Producer calls append and
//! fan out drains; the terminal transition claims the cell first, appends
//! the closing entry, seals the registry, then drains the final snapshot.

use crate::buffer::{AgeBoundBuffer, Entry, ReplayBuffer, SizeBoundBuffer, UnboundedBuffer};
use crate::clock::{duration_millis, Clock, SystemClock};
use crate::error::{AbsentItemError, Failure};
use crate::handle::{HandleInner, Subscription};
use crate::hooks;
use crate::registry::Registry;
use crate::subscriber::Subscriber;
use crate::terminal::{Terminal, TerminalCell};
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Shared innards of a bus; handles hold this weakly so a dropped bus can
/// be reclaimed even while user code keeps subscriptions around.
pub(crate) struct BusState<T: Clone> {
    buffer: Box<dyn ReplayBuffer<T>>,
    registry: Registry<T>,
    terminal: TerminalCell,
}

impl<T: Clone> BusState<T> {
    pub(crate) fn remove_handle(&self, handle: &Arc<HandleInner<T>>) {
        self.registry.remove(handle);
        debug!(
            subscriber_count = self.registry.len(),
            "Subscriber detached"
        );
    }
}

/// Multicast event hub that replays buffered history to every new
/// subscriber before feeding it live events.
///
/// Cloning is cheap and every clone drives the same hub. Which slice of
/// history a late subscriber sees is decided by the constructor's retention
/// strategy; delivery order per subscriber is always publish order, closed
/// by at most one terminal callback.
///
/// Producer-side calls (`publish`, `publish_opt`, `complete`, `fail`) must
/// be serialized by the caller with respect to item appends; terminal calls
/// tolerate racing each other, electing a single winner. Consumer-side
/// operations (subscribe, cancel, the accessors) may race anything from any
/// thread.
pub struct ReplayBus<T: Clone> {
    state: Arc<BusState<T>>,
}

impl<T> ReplayBus<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unbounded bus with the default capacity hint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity_hint(crate::DEFAULT_CAPACITY_HINT)
    }

    /// Unbounded bus; `capacity_hint` sizes the first storage segment.
    ///
    /// # Panics
    ///
    /// Panics if `capacity_hint` is zero.
    #[must_use]
    pub fn with_capacity_hint(capacity_hint: usize) -> Self {
        assert!(capacity_hint > 0, "capacity_hint must be positive");
        Self::from_buffer(Box::new(UnboundedBuffer::with_hint(capacity_hint)))
    }

    /// Bus replaying at most the `max_len` newest items.
    ///
    /// # Panics
    ///
    /// Panics if `max_len` is zero.
    #[must_use]
    pub fn with_max_len(max_len: usize) -> Self {
        assert!(max_len > 0, "max_len must be positive");
        Self::from_buffer(Box::new(SizeBoundBuffer::new(max_len)))
    }

    /// Bus replaying only items younger than `max_age`, on the system clock.
    ///
    /// # Panics
    ///
    /// Panics if `max_age` is zero.
    #[must_use]
    pub fn with_max_age(max_age: Duration) -> Self {
        Self::with_retention(max_age, usize::MAX, Arc::new(SystemClock::new()))
    }

    /// Bus bounding history by age and count at once, on the system clock.
    ///
    /// # Panics
    ///
    /// Panics if `max_age` or `max_len` is zero.
    #[must_use]
    pub fn with_max_age_and_len(max_age: Duration, max_len: usize) -> Self {
        Self::with_retention(max_age, max_len, Arc::new(SystemClock::new()))
    }

    /// Fully parameterized age-bound bus with an injected clock.
    ///
    /// # Panics
    ///
    /// Panics if `max_age` or `max_len` is zero.
    #[must_use]
    pub fn with_retention(max_age: Duration, max_len: usize, clock: Arc<dyn Clock>) -> Self {
        assert!(!max_age.is_zero(), "max_age must be positive");
        assert!(max_len > 0, "max_len must be positive");
        Self::from_buffer(Box::new(AgeBoundBuffer::new(
            max_len,
            duration_millis(max_age),
            clock,
        )))
    }

    /// Unbounded bus on chain storage instead of the segmented log. Useful
    /// when eviction is off but chain semantics are wanted, e.g. to hold
    /// items by shared node rather than by slot.
    #[doc(hidden)]
    #[must_use]
    pub fn with_unbounded_chain() -> Self {
        Self::from_buffer(Box::new(SizeBoundBuffer::new(usize::MAX)))
    }

    fn from_buffer(buffer: Box<dyn ReplayBuffer<T>>) -> Self {
        Self {
            state: Arc::new(BusState {
                buffer,
                registry: Registry::new(),
                terminal: TerminalCell::new(),
            }),
        }
    }

    /// Attaches a subscriber: acknowledges it, replays history, then keeps
    /// it fed until cancellation or the terminal event.
    ///
    /// Subscribing to a terminated bus still delivers the full frozen
    /// history plus the terminal callback, synchronously.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) -> Subscription<T> {
        let handle = Arc::new(HandleInner::new(subscriber, Arc::downgrade(&self.state)));
        let subscription = Subscription::new(Arc::clone(&handle));
        handle.subscriber.on_subscribe(&subscription);
        if subscription.is_cancelled() {
            return subscription;
        }
        if self.state.registry.try_add(&handle) {
            // The acknowledged subscriber may have cancelled from another
            // thread between the ack and the add; undo the add if so.
            if handle.is_cancelled() {
                self.state.registry.remove(&handle);
                return subscription;
            }
            debug!(
                subscriber_count = self.state.registry.len(),
                "Subscriber attached"
            );
        } else {
            debug!("Bus already terminated; delivering frozen replay");
        }
        // Pairs with the fence in `publish`: either the publisher's registry
        // snapshot includes this handle, or this replay sees its append.
        fence(Ordering::SeqCst);
        self.state.buffer.replay_for(&handle);
        subscription
    }

    /// Appends one item and fans it out to every live subscriber.
    ///
    /// A no-op once the bus is terminated.
    pub fn publish(&self, item: T) {
        if self.state.terminal.is_set() {
            trace!("Dropping item published after the terminal event");
            return;
        }
        self.state.buffer.append(item);
        // Pairs with the fence in `subscribe`; a handle registering while
        // this append is in flight cannot miss it on both sides.
        fence(Ordering::SeqCst);
        for handle in self.state.registry.snapshot().iter() {
            self.state.buffer.replay_for(handle);
        }
    }

    /// Publishes the item if present; fails the bus with
    /// [`AbsentItemError`] if not.
    pub fn publish_opt(&self, item: Option<T>) {
        match item {
            Some(item) => self.publish(item),
            None => self.fail(AbsentItemError),
        }
    }

    /// Completes the bus. The first terminal call wins; later `complete`
    /// calls are swallowed.
    pub fn complete(&self) {
        if !self.state.terminal.try_install(Terminal::Completed) {
            return;
        }
        self.state.buffer.append_terminal(Entry::Complete);
        let snapshot = self.state.registry.seal();
        debug!(subscriber_count = snapshot.len(), "Bus completed");
        for handle in snapshot.iter() {
            self.state.buffer.replay_for(handle);
        }
    }

    /// Fails the bus with `error`, delivering the same shared instance to
    /// every subscriber.
    pub fn fail<E>(&self, error: E)
    where
        E: StdError + Send + Sync + 'static,
    {
        self.fail_shared(Arc::new(error));
    }

    /// Fails the bus with an already-shared error.
    ///
    /// If a terminal event won the race earlier, the error can no longer
    /// reach any subscriber and is routed to the
    /// [dropped-error hook](crate::set_dropped_error_hook) instead.
    pub fn fail_shared(&self, failure: Failure) {
        if !self
            .state
            .terminal
            .try_install(Terminal::Failed(Arc::clone(&failure)))
        {
            hooks::dropped_error(failure);
            return;
        }
        self.state
            .buffer
            .append_terminal(Entry::Fail(Arc::clone(&failure)));
        let snapshot = self.state.registry.seal();
        debug!(
            subscriber_count = snapshot.len(),
            error = %failure,
            "Bus failed"
        );
        for handle in snapshot.iter() {
            self.state.buffer.replay_for(handle);
        }
    }

    /// The failure the bus terminated with, if it failed.
    pub fn error(&self) -> Option<Failure> {
        match self.state.terminal.get() {
            Terminal::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether the bus terminated with a failure.
    pub fn has_failed(&self) -> bool {
        matches!(self.state.terminal.get(), Terminal::Failed(_))
    }

    /// Whether the bus terminated by completing.
    pub fn has_completed(&self) -> bool {
        matches!(self.state.terminal.get(), Terminal::Completed)
    }

    /// Whether either terminal event has been installed.
    pub fn is_terminated(&self) -> bool {
        self.state.terminal.is_set()
    }

    /// Newest buffered item a fresh subscriber would receive first-to-last,
    /// i.e. the last element of [`snapshot`](Self::snapshot).
    pub fn last_item(&self) -> Option<T> {
        self.state.buffer.peek_last()
    }

    /// All currently replayable items, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        let mut items = Vec::new();
        self.state.buffer.snapshot_into(&mut items);
        items
    }

    /// Like [`snapshot`](Self::snapshot), reusing `dest`'s allocation.
    pub fn snapshot_into(&self, dest: &mut Vec<T>) {
        self.state.buffer.snapshot_into(dest);
    }

    /// Count of currently replayable items.
    pub fn len(&self) -> usize {
        self.state.buffer.len()
    }

    /// Whether no replayable items are buffered.
    pub fn is_empty(&self) -> bool {
        self.state.buffer.is_empty()
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state.registry.len()
    }

    /// Whether at least one subscriber is currently attached.
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }
}

impl<T> Default for ReplayBus<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for ReplayBus<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for ReplayBus<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayBus")
            .field("len", &self.len())
            .field("subscriber_count", &self.subscriber_count())
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}

/// A bus is itself a subscriber, so one bus can be piped into another:
/// `source.subscribe(Arc::new(sink.clone()))` replays the source's history
/// into the sink and then forwards its live events and terminal.
impl<T> Subscriber<T> for ReplayBus<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn on_subscribe(&self, subscription: &Subscription<T>) {
        // A terminated sink can accept nothing more; detach immediately.
        if self.is_terminated() {
            subscription.cancel();
        }
    }

    fn on_item(&self, item: T) {
        self.publish(item);
    }

    fn on_error(&self, error: Failure) {
        self.fail_shared(error);
    }

    fn on_complete(&self) {
        self.complete();
    }
}
