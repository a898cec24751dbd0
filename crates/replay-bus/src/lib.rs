//! # Replay Bus - Multicast Event Hub with History Replay
//!
//! A [`ReplayBus`] delivers every published item to every subscriber, and a
//! subscriber that shows up late first receives the buffered history before
//! the live stream continues. How much history survives is the retention
//! strategy picked at construction time.
//!
//! ## Fan-Out Shape
//!
//! ```text
//! ┌──────────┐  publish() / complete() / fail()
//! │ Producer │ ──────────────┐
//! └──────────┘               ▼
//!                   ┌──────────────────┐
//!                   │     ReplayBus    │
//!                   │ buffer, registry │
//!                   │  terminal cell   │
//!                   └───┬──────────┬───┘
//!        replay history │         │ live events
//!                       ▼         ▼
//!              ┌────────────┐   ┌────────────┐
//!              │ Subscriber │   │ Subscriber │
//!              │   (late)   │   │  (early)   │
//!              └────────────┘   └────────────┘
//! ```
//!
//! ## Retention Strategies
//!
//! - [`ReplayBus::new`] / [`ReplayBus::with_capacity_hint`]: keep everything
//! - [`ReplayBus::with_max_len`]: keep the newest `max_len` items
//! - [`ReplayBus::with_max_age`] / [`ReplayBus::with_max_age_and_len`]:
//!   keep what is young enough, optionally also count-capped
//!
//! ## Delivery Guarantees
//!
//! - Per-subscriber delivery is in publish order, with no loss and no
//!   duplicates, even while eviction runs concurrently
//! - At most one terminal callback per subscriber, strictly after its items
//! - A single-flight drain per subscriber: concurrent signals collapse onto
//!   whichever thread currently holds that subscriber's drain claim

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod clock;
pub mod error;
pub mod handle;
pub mod hooks;
pub mod subscriber;

mod buffer;
mod registry;
mod terminal;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types
pub use bus::ReplayBus;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AbsentItemError, Failure};
pub use handle::Subscription;
pub use hooks::{clear_dropped_error_hook, set_dropped_error_hook, DroppedErrorHook};
pub use subscriber::Subscriber;

/// First storage segment size for unbounded buses built without a hint.
pub const DEFAULT_CAPACITY_HINT: usize = 16;
