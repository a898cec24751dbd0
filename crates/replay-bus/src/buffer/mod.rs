//! # Replay Buffers
//!
//! Storage strategies behind a bus. All three share one contract: the
//! producer appends, subscribers replay through the drain protocol, and the
//! strategy decides what old history new subscribers still get to see.
//!
//! | Strategy              | Backing store             | Eviction                          |
//! |-----------------------|---------------------------|-----------------------------------|
//! | [`UnboundedBuffer`]   | segmented append-only log | never                             |
//! | [`SizeBoundBuffer`]   | linked chain              | oldest item once over `max_len`   |
//! | [`AgeBoundBuffer`]    | linked chain              | size rule, then anything too old  |

pub(crate) mod node;

mod age_bound;
mod size_bound;
mod unbounded;

pub(crate) use age_bound::AgeBoundBuffer;
pub(crate) use size_bound::SizeBoundBuffer;
pub(crate) use unbounded::UnboundedBuffer;

use crate::error::Failure;
use crate::handle::HandleInner;

/// One stored event.
#[derive(Debug, Clone)]
pub(crate) enum Entry<T> {
    Item(T),
    Complete,
    Fail(Failure),
}

impl<T> Entry<T> {
    pub(crate) fn is_terminal(&self) -> bool {
        !matches!(self, Self::Item(_))
    }
}

/// Contract shared by the storage strategies.
///
/// `append_terminal` is called at most once per buffer life; the bus's
/// terminal cell enforces it. Afterwards the buffer is frozen, apart from
/// the single age purge the age-bound strategy runs at termination time.
pub(crate) trait ReplayBuffer<T: Clone>: Send + Sync {
    /// Appends one item and applies the strategy's eviction rule.
    fn append(&self, item: T);

    /// Appends the closing entry. Never evicts by size.
    fn append_terminal(&self, entry: Entry<T>);

    /// Count of live, non-terminal items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recently appended live item.
    fn peek_last(&self) -> Option<T>;

    /// Replaces `dest` with all live items, oldest first.
    fn snapshot_into(&self, dest: &mut Vec<T>);

    /// Runs one drain cycle for the given handle. Claim and release
    /// semantics live on [`HandleInner`].
    fn replay_for(&self, handle: &HandleInner<T>);
}
