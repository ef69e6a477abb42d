//! Sequence implementation for the Disruptor
//!
//! The Sequence is used to track progress through the ring buffer and coordinate
//! between producers and consumers. It provides atomic operations while preventing
//! false sharing through careful memory layout.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Cache line size for padding to prevent false sharing
const CACHE_LINE_SIZE: usize = 64;

const PADDING: usize = CACHE_LINE_SIZE - std::mem::size_of::<AtomicI64>();

/// A sequence number that prevents false sharing
///
/// The counter is flanked by padding on both sides so that two independently
/// updated sequences never share a cache line, whatever their neighbours in
/// memory are.
#[repr(C, align(64))]
pub struct Sequence {
    _padding_left: [u8; PADDING],
    /// The actual sequence value
    value: AtomicI64,
    _padding_right: [u8; PADDING],
}

impl Sequence {
    /// Create a new sequence with the given initial value
    pub fn new(initial_value: i64) -> Self {
        Self {
            _padding_left: [0; PADDING],
            value: AtomicI64::new(initial_value),
            _padding_right: [0; PADDING],
        }
    }

    /// Create a new sequence starting at [`INITIAL_CURSOR_VALUE`](crate::disruptor::INITIAL_CURSOR_VALUE)
    pub fn new_with_initial_value() -> Self {
        Self::new(crate::disruptor::INITIAL_CURSOR_VALUE)
    }

    /// Get the current sequence value
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Set the sequence value
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Set the sequence value with a full fence
    #[inline]
    pub fn set_volatile(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Atomically set the value to `new` if it currently holds `expected`
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Increment and get the new value
    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    /// Add a value and get the new result
    #[inline]
    pub fn add_and_get(&self, increment: i64) -> i64 {
        self.value.fetch_add(increment, Ordering::AcqRel) + increment
    }

    /// Get the current value and then add
    #[inline]
    pub fn get_and_add(&self, increment: i64) -> i64 {
        self.value.fetch_add(increment, Ordering::AcqRel)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new_with_initial_value()
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("value", &self.get())
            .finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Minimum value over `sequences`, or `default` when the slice is empty
pub fn get_minimum_sequence(sequences: &[Arc<Sequence>], default: i64) -> i64 {
    sequences
        .iter()
        .map(|sequence| sequence.get())
        .min()
        .unwrap_or(default)
}

/// A group of sequences that can be tracked together
///
/// Membership is by identity (`Arc::ptr_eq`), never by value. Used by the ring
/// buffer for its gating set, which may be rewired while the graph is built.
#[derive(Debug, Default)]
pub struct SequenceGroup {
    sequences: RwLock<Vec<Arc<Sequence>>>,
}

impl SequenceGroup {
    /// Create a new empty sequence group
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sequence to the group
    pub fn add(&self, sequence: Arc<Sequence>) {
        self.sequences.write().push(sequence);
    }

    /// Add several sequences to the group
    pub fn add_all(&self, sequences: &[Arc<Sequence>]) {
        self.sequences.write().extend_from_slice(sequences);
    }

    /// Add sequences positioned at the current value of `cursor`
    ///
    /// Each sequence is moved to the cursor while the group is locked for
    /// writing, so the producer never sees a newly added member behind the
    /// cursor and a late consumer starts after the events already published
    /// rather than reading slots that may have been overwritten.
    pub fn add_all_at_cursor(&self, sequences: &[Arc<Sequence>], cursor: &Sequence) {
        let mut members = self.sequences.write();
        let position = cursor.get();
        for sequence in sequences {
            sequence.set(position);
        }
        members.extend_from_slice(sequences);

        // The cursor may have moved before the new members were visible
        let position = cursor.get();
        for sequence in sequences {
            sequence.set(position);
        }
    }

    /// Remove a sequence from the group
    pub fn remove(&self, sequence: &Arc<Sequence>) -> bool {
        let mut sequences = self.sequences.write();
        match sequences.iter().position(|s| Arc::ptr_eq(s, sequence)) {
            Some(pos) => {
                sequences.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Get the minimum sequence value from all sequences in the group
    pub fn get_minimum_sequence(&self, default: i64) -> i64 {
        get_minimum_sequence(&self.sequences.read(), default)
    }

    /// Get the number of sequences in the group
    pub fn len(&self) -> usize {
        self.sequences.read().len()
    }

    /// Check if the group is empty
    pub fn is_empty(&self) -> bool {
        self.sequences.read().is_empty()
    }

    /// Copy of the current membership
    pub fn snapshot(&self) -> Vec<Arc<Sequence>> {
        self.sequences.read().clone()
    }
}
