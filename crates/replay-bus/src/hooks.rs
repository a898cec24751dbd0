//! # Dropped-Error Hook
//!
//! A terminated bus cannot deliver a second terminal error to anyone, and
//! silently discarding it would hide producer bugs. Such errors are routed to
//! a process-wide hook instead; the default hook logs them.

use crate::error::Failure;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::error;

/// Callback invoked with errors that can no longer reach any subscriber.
pub type DroppedErrorHook = dyn Fn(Failure) + Send + Sync;

static DROPPED_ERROR_HOOK: ArcSwapOption<Box<DroppedErrorHook>> = ArcSwapOption::const_empty();

/// Replaces the process-wide hook for undeliverable terminal errors.
///
/// The hook observes errors handed to an already-terminated bus and errors
/// reaching a [`Subscriber`](crate::Subscriber) without an `on_error`
/// implementation. It may be called concurrently from any thread.
pub fn set_dropped_error_hook<F>(hook: F)
where
    F: Fn(Failure) + Send + Sync + 'static,
{
    DROPPED_ERROR_HOOK.store(Some(Arc::new(Box::new(hook))));
}

/// Restores the default hook, which logs dropped errors at `ERROR` level.
pub fn clear_dropped_error_hook() {
    DROPPED_ERROR_HOOK.store(None);
}

/// Routes an undeliverable error to the installed hook.
pub(crate) fn dropped_error(failure: Failure) {
    match DROPPED_ERROR_HOOK.load_full() {
        Some(hook) => hook(failure),
        None => error!(error = %failure, "Dropped terminal error with no live receiver"),
    }
}
