//! # Global Sequence
//!
//! Every instance gets a sequence index, auto and explicit creations alike.
//! Indices start at [`FIRST_INSTANCE_INDEX`] and grow by exactly one per
//! successful creation.
//!
//! The counter is the only mutable resource shared across creation calls,
//! so it sits behind [`SequenceGenerator`]: an injected service with an
//! atomic increment-and-read. Callers take an index through a
//! [`SequenceReservation`], which hands the index back if the call that
//! took it fails before committing.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::FIRST_INSTANCE_INDEX;

/// Source of instance indices.
pub trait SequenceGenerator: Send + Sync {
    /// The latest index handed out, or `FIRST_INSTANCE_INDEX - 1` if none.
    fn current(&self) -> u64;

    /// Atomically increments the counter and returns the new index.
    fn increment(&self) -> u64;

    /// Undoes the increment that produced `index`. Succeeds only if no
    /// other increment happened since; returns whether it did.
    fn rollback(&self, index: u64) -> bool;

    /// The index the next [`increment`](Self::increment) will return,
    /// absent concurrent callers.
    fn peek(&self) -> u64 {
        self.current() + 1
    }
}

/// Lock-free counter backed by an [`AtomicU64`].
#[derive(Debug)]
pub struct AtomicSequence {
    latest: AtomicU64,
}

impl AtomicSequence {
    /// A fresh counter; the first index handed out is
    /// [`FIRST_INSTANCE_INDEX`].
    pub fn new() -> Self {
        Self::starting_at(FIRST_INSTANCE_INDEX - 1)
    }

    /// Resumes a counter whose latest handed-out index is `latest`.
    pub fn starting_at(latest: u64) -> Self {
        Self {
            latest: AtomicU64::new(latest),
        }
    }
}

impl Default for AtomicSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceGenerator for AtomicSequence {
    fn current(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    fn increment(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn rollback(&self, index: u64) -> bool {
        self.latest
            .compare_exchange(index, index - 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// An index taken from a [`SequenceGenerator`] that is returned on drop
/// unless [`commit`](Self::commit)ted.
#[must_use = "an uncommitted reservation is rolled back on drop"]
pub struct SequenceReservation<'a, S: SequenceGenerator + ?Sized> {
    source: &'a S,
    index: u64,
    committed: bool,
}

impl<'a, S: SequenceGenerator + ?Sized> SequenceReservation<'a, S> {
    /// Increments `source` and holds the resulting index.
    pub fn reserve(source: &'a S) -> Self {
        let index = source.increment();
        Self {
            source,
            index,
            committed: false,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Keeps the index for good.
    pub fn commit(mut self) -> u64 {
        self.committed = true;
        self.index
    }
}

impl<S: SequenceGenerator + ?Sized> Drop for SequenceReservation<'_, S> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if self.source.rollback(self.index) {
            tracing::debug!(index = self.index, "sequence reservation rolled back");
        } else {
            tracing::warn!(
                index = self.index,
                "sequence advanced concurrently; index {} is burned",
                self.index
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_index() {
        let seq = AtomicSequence::new();
        assert_eq!(seq.peek(), FIRST_INSTANCE_INDEX);
        assert_eq!(seq.increment(), FIRST_INSTANCE_INDEX);
        assert_eq!(seq.current(), FIRST_INSTANCE_INDEX);
    }

    #[test]
    fn test_committed_reservation_sticks() {
        let seq = AtomicSequence::new();
        let r = SequenceReservation::reserve(&seq);
        assert_eq!(r.index(), 1);
        assert_eq!(r.commit(), 1);
        assert_eq!(seq.current(), 1);
    }

    #[test]
    fn test_dropped_reservation_rolls_back() {
        let seq = AtomicSequence::new();
        {
            let r = SequenceReservation::reserve(&seq);
            assert_eq!(r.index(), 1);
        }
        assert_eq!(seq.current(), 0);
        assert_eq!(SequenceReservation::reserve(&seq).commit(), 1);
    }

    #[test]
    fn test_rollback_refused_after_later_increment() {
        let seq = AtomicSequence::new();
        let first = seq.increment();
        let _second = seq.increment();
        assert!(!seq.rollback(first));
        assert_eq!(seq.current(), 2);
    }

    #[test]
    fn test_resume_from_persisted_value() {
        let seq = AtomicSequence::starting_at(41);
        assert_eq!(seq.increment(), 42);
    }

    #[test]
    fn test_concurrent_increments_never_repeat() {
        let seq = Arc::new(AtomicSequence::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = Arc::clone(&seq);
                thread::spawn(move || (0..250).map(|_| seq.increment()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        let expected: Vec<u64> = (1..=2000).collect();
        assert_eq!(all, expected);
    }
}
