//! # Subscriber Contract
//!
//! Consumer-side callbacks. A subscriber is owned by the bus for as long as
//! its [`Subscription`] stays active and may be invoked from whichever thread
//! happens to be draining it, so implementations must be thread-safe.

use crate::error::Failure;
use crate::handle::Subscription;
use std::sync::Arc;

/// Receiver of the replayed history and of every subsequent event.
///
/// Callback order for one subscriber is always `on_subscribe`, then zero or
/// more `on_item` calls, then at most one of `on_error` / `on_complete`.
/// Callbacks never overlap for a single subscriber, but different subscribers
/// of the same bus run independently.
pub trait Subscriber<T: Clone>: Send + Sync {
    /// Called once, before any item, with the subscription controlling this
    /// attachment. Cancelling from inside the callback is allowed and
    /// suppresses all further delivery.
    fn on_subscribe(&self, subscription: &Subscription<T>) {
        let _ = subscription;
    }

    /// Called with each replayed or live item, in publish order.
    fn on_item(&self, item: T);

    /// Called once if the bus fails.
    ///
    /// The default implementation hands the error to the process-wide
    /// [dropped-error hook](crate::set_dropped_error_hook), mirroring what
    /// happens to errors that reach nobody at all.
    fn on_error(&self, error: Failure) {
        crate::hooks::dropped_error(error);
    }

    /// Called once if the bus completes.
    fn on_complete(&self) {}
}

/// Delegates to the wrapped subscriber.
impl<T: Clone, S: Subscriber<T> + ?Sized> Subscriber<T> for Arc<S> {
    fn on_subscribe(&self, subscription: &Subscription<T>) {
        (**self).on_subscribe(subscription);
    }

    fn on_item(&self, item: T) {
        (**self).on_item(item);
    }

    fn on_error(&self, error: Failure) {
        (**self).on_error(error);
    }

    fn on_complete(&self) {
        (**self).on_complete();
    }
}

/// Delegates to the boxed subscriber.
impl<T: Clone, S: Subscriber<T> + ?Sized> Subscriber<T> for Box<S> {
    fn on_subscribe(&self, subscription: &Subscription<T>) {
        (**self).on_subscribe(subscription);
    }

    fn on_item(&self, item: T) {
        (**self).on_item(item);
    }

    fn on_error(&self, error: Failure) {
        (**self).on_error(error);
    }

    fn on_complete(&self) {
        (**self).on_complete();
    }
}
