//! # Unbounded Buffer
//!
//! Append-only log with no eviction. Storage is a directory of power-of-two
//! segments so appends never reallocate or move published entries; readers
//! index straight into a slot once the published length covers it. The
//! capacity hint sizes the first segment and nothing else.

use super::{Entry, ReplayBuffer};
use crate::handle::HandleInner;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

const SEGMENTS: usize = 32;

type Segment<T> = Box<[OnceLock<Entry<T>>]>;

pub(crate) struct UnboundedBuffer<T> {
    /// First segment length; every later segment doubles.
    base: usize,
    segments: [OnceLock<Segment<T>>; SEGMENTS],
    /// Published entry count, terminal included. Store-release pairs with
    /// the load-acquire on every read path.
    len: AtomicUsize,
}

impl<T> UnboundedBuffer<T> {
    pub(crate) fn with_hint(capacity_hint: usize) -> Self {
        let base = capacity_hint
            .checked_next_power_of_two()
            .unwrap_or(1 << (usize::BITS - 1))
            .max(1);
        let buffer = Self {
            base,
            segments: std::array::from_fn(|_| OnceLock::new()),
            len: AtomicUsize::new(0),
        };
        let _ = buffer.segments[0].set(Self::fresh_segment(base));
        buffer
    }

    fn fresh_segment(len: usize) -> Segment<T> {
        std::iter::repeat_with(OnceLock::new)
            .take(len)
            .collect::<Vec<_>>()
            .into_boxed_slice()
    }

    /// Maps an absolute position to (segment, offset, segment length).
    ///
    /// Segment `k` holds `base << k` slots starting at absolute position
    /// `base * (2^k - 1)`.
    fn locate(&self, index: usize) -> (usize, usize, usize) {
        if index < self.base {
            return (0, index, self.base);
        }
        let segment = ((index / self.base) + 1).ilog2() as usize;
        let offset = index - self.base * ((1usize << segment) - 1);
        (segment, offset, self.base << segment)
    }

    fn slot(&self, index: usize) -> &OnceLock<Entry<T>> {
        let (segment, offset, segment_len) = self.locate(index);
        let slots = self.segments[segment].get_or_init(|| Self::fresh_segment(segment_len));
        &slots[offset]
    }

    /// Published entry at `index`, if the slot is both allocated and set.
    fn entry(&self, index: usize) -> Option<&Entry<T>> {
        let (segment, offset, _) = self.locate(index);
        self.segments[segment].get()?[offset].get()
    }

    fn push(&self, entry: Entry<T>) {
        let index = self.len.load(Ordering::Relaxed);
        let _ = self.slot(index).set(entry);
        self.len.store(index + 1, Ordering::Release);
    }
}

impl<T: Clone + Send + Sync> ReplayBuffer<T> for UnboundedBuffer<T> {
    fn append(&self, item: T) {
        self.push(Entry::Item(item));
    }

    fn append_terminal(&self, entry: Entry<T>) {
        self.push(entry);
    }

    fn len(&self) -> usize {
        let mut published = self.len.load(Ordering::Acquire);
        if published > 0 {
            if let Some(entry) = self.entry(published - 1) {
                if entry.is_terminal() {
                    published -= 1;
                }
            }
        }
        published
    }

    fn peek_last(&self) -> Option<T> {
        let mut remaining = self.len.load(Ordering::Acquire);
        while remaining > 0 {
            match self.entry(remaining - 1)? {
                Entry::Item(item) => return Some(item.clone()),
                _ => remaining -= 1,
            }
        }
        None
    }

    fn snapshot_into(&self, dest: &mut Vec<T>) {
        dest.clear();
        let published = self.len.load(Ordering::Acquire);
        dest.reserve(published);
        for index in 0..published {
            match self.entry(index) {
                Some(Entry::Item(item)) => dest.push(item.clone()),
                Some(_) | None => break,
            }
        }
    }

    fn replay_for(&self, handle: &HandleInner<T>) {
        if !handle.try_claim_drain() {
            return;
        }
        let mut missed = 1;
        let mut position = handle.position();
        loop {
            loop {
                if handle.is_cancelled() {
                    return;
                }
                let published = self.len.load(Ordering::Acquire);
                if position >= published {
                    break;
                }
                let Some(entry) = self.entry(position) else { break };
                match entry {
                    Entry::Item(item) => handle.subscriber.on_item(item.clone()),
                    Entry::Complete => {
                        handle.subscriber.on_complete();
                        handle.mark_cancelled();
                        return;
                    }
                    Entry::Fail(failure) => {
                        handle.subscriber.on_error(Arc::clone(failure));
                        handle.mark_cancelled();
                        return;
                    }
                }
                position += 1;
            }
            handle.set_position(position);
            missed = handle.release_drain(missed);
            if missed == 0 {
                return;
            }
        }
    }
}
