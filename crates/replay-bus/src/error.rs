//! # Failure Payloads
//!
//! Terminal failures travel as a shared, cloneable error object so that every
//! consumer observes the same authoritative instance.

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Shared failure payload delivered to every subscriber of a failed bus.
///
/// Cloning shares the underlying error; concrete types are recoverable via
/// [`std::error::Error`] downcasting.
pub type Failure = Arc<dyn StdError + Send + Sync + 'static>;

/// An optional item resolved to nothing on publish.
///
/// Produced by [`ReplayBus::publish_opt`](crate::ReplayBus::publish_opt) when
/// the producer hands the bus an absent item; the bus fails with this error
/// instead of delivering a hole in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("published item was absent")]
pub struct AbsentItemError;
