//! Shared test fixtures for the unit suites.

use crate::error::Failure;
use crate::handle::Subscription;
use crate::subscriber::Subscriber;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Subscriber that records every callback, optionally cancelling itself
/// after a fixed number of items.
pub(crate) struct Recorder<T: Clone> {
    items: Mutex<Vec<T>>,
    errors: Mutex<Vec<Failure>>,
    completions: AtomicUsize,
    subscription: Mutex<Option<Subscription<T>>>,
    cancel_after: usize,
}

impl<T: Clone> Recorder<T> {
    pub(crate) fn new() -> Arc<Self> {
        Self::cancelling_after(usize::MAX)
    }

    /// Recorder that cancels its own subscription upon receiving its
    /// `cancel_after`-th item.
    pub(crate) fn cancelling_after(cancel_after: usize) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            completions: AtomicUsize::new(0),
            subscription: Mutex::new(None),
            cancel_after,
        })
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.items.lock().expect("recorder poisoned").clone()
    }

    pub(crate) fn errors(&self) -> Vec<Failure> {
        self.errors.lock().expect("recorder poisoned").clone()
    }

    pub(crate) fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send + Sync> Subscriber<T> for Recorder<T> {
    fn on_subscribe(&self, subscription: &Subscription<T>) {
        *self.subscription.lock().expect("recorder poisoned") = Some(subscription.clone());
    }

    fn on_item(&self, item: T) {
        let received = {
            let mut items = self.items.lock().expect("recorder poisoned");
            items.push(item);
            items.len()
        };
        if received >= self.cancel_after {
            let subscription = self.subscription.lock().expect("recorder poisoned");
            if let Some(subscription) = subscription.as_ref() {
                subscription.cancel();
            }
        }
    }

    fn on_error(&self, error: Failure) {
        self.errors.lock().expect("recorder poisoned").push(error);
    }

    fn on_complete(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}
