//! Ring Buffer Implementation
//!
//! This module provides the core ring buffer for the Disruptor pattern.
//! The ring buffer is a pre-allocated circular array that stores events,
//! together with the cursor, claim strategy and gating sequences that make
//! lock-free hand-off between producers and consumers safe.

use crate::disruptor::{
    is_power_of_two, AlertFlag, CapacityGate, ClaimStrategy, DisruptorError, EventFactory,
    EventTranslator, EventTranslatorOneArg, EventTranslatorTwoArg, ProcessingSequenceBarrier,
    ProducerType, Result, Sequence, SequenceGroup, WaitStrategy,
};
use std::cell::UnsafeCell;
use std::sync::Arc;

/// The core ring buffer for storing events
///
/// Slots are pre-allocated by an [`EventFactory`] and reused for the lifetime
/// of the buffer. A slot belongs exclusively to the producer that claimed its
/// sequence until that sequence is published; afterwards it is read-only until
/// a later claim wraps around onto it, which the gating sequences only allow
/// once every consumer has finished with it.
///
/// # Type Parameters
/// * `T` - The event type stored in the buffer
pub struct RingBuffer<T> {
    /// Using `Box<[UnsafeCell<T>]>` for better memory layout than `Vec<T>`
    slots: Box<[UnsafeCell<T>]>,
    /// Mask for fast modulo operations (buffer_size - 1)
    index_mask: i64,
    /// Highest sequence visible to consumers
    cursor: Arc<Sequence>,
    claim_strategy: Box<dyn ClaimStrategy>,
    wait_strategy: Arc<dyn WaitStrategy>,
    /// Sequences of the leaf consumers the producer must not overtake
    gating_sequences: SequenceGroup,
    /// Raised on halt so producers stuck on a full buffer unwind
    alert: AlertFlag,
    producer_type: ProducerType,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer
    ///
    /// # Arguments
    /// * `buffer_size` - The number of slots (must be a power of 2)
    /// * `event_factory` - Factory for pre-populating every slot
    /// * `producer_type` - Selects the claim strategy
    /// * `wait_strategy` - Used by consumers waiting for events and by
    ///   producers waiting for free capacity
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if buffer_size is not a power of 2
    pub fn new<F>(
        buffer_size: usize,
        event_factory: F,
        producer_type: ProducerType,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        if !is_power_of_two(buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }

        let slots: Box<[UnsafeCell<T>]> = (0..buffer_size)
            .map(|_| UnsafeCell::new(event_factory.new_instance()))
            .collect();

        Ok(Self {
            slots,
            index_mask: (buffer_size - 1) as i64,
            cursor: Arc::new(Sequence::new_with_initial_value()),
            claim_strategy: producer_type.claim_strategy(buffer_size),
            wait_strategy,
            gating_sequences: SequenceGroup::new(),
            alert: AlertFlag::new(),
            producer_type,
        })
    }

    fn gate(&self) -> CapacityGate<'_> {
        CapacityGate {
            cursor: &self.cursor,
            gating_sequences: &self.gating_sequences,
            wait_strategy: self.wait_strategy.as_ref(),
            alert: &self.alert,
        }
    }

    fn check_claim(&self, n: usize) -> Result<()> {
        if n == 0 || n > self.slots.len() {
            return Err(DisruptorError::InvalidClaim(n));
        }
        Ok(())
    }

    /// Claim the next sequence, waiting while the buffer is full
    ///
    /// # Errors
    /// `DisruptorError::Alert` if the ring buffer is halted while waiting
    pub fn next(&self) -> Result<i64> {
        self.next_n(1)
    }

    /// Claim the next `n` sequences, waiting while the buffer is full
    ///
    /// # Returns
    /// The highest claimed sequence; the range is `(high - n + 1)..=high`
    ///
    /// # Errors
    /// `DisruptorError::InvalidClaim` unless `1 <= n <= buffer_size`,
    /// `DisruptorError::Alert` if the ring buffer is halted while waiting
    pub fn next_n(&self, n: usize) -> Result<i64> {
        self.check_claim(n)?;
        self.claim_strategy.next(n, &self.gate())
    }

    /// Claim the next sequence without waiting
    ///
    /// # Errors
    /// `DisruptorError::InsufficientCapacity` if the buffer is full
    pub fn try_next(&self) -> Result<i64> {
        self.try_next_n(1)
    }

    /// Claim the next `n` sequences without waiting
    pub fn try_next_n(&self, n: usize) -> Result<i64> {
        self.check_claim(n)?;
        self.claim_strategy.try_next(n, &self.gate())
    }

    /// Get a reference to the event at a published sequence
    ///
    /// # Safety
    /// `sequence` must be published, and the returned reference must be
    /// dropped before any producer can claim the slot again. Batch event
    /// processors guarantee this through their barrier and gating sequence.
    /// Any other caller must gate the producer itself, otherwise a later
    /// claim writes into the slot while the reference is still alive.
    ///
    /// Reading a slot is never possible from safe code:
    ///
    /// ```compile_fail
    /// use ringway::disruptor::{BusySpinWaitStrategy, DefaultEventFactory, ProducerType, RingBuffer};
    /// use std::sync::Arc;
    ///
    /// let ring_buffer = RingBuffer::new(
    ///     1,
    ///     DefaultEventFactory::<String>::new(),
    ///     ProducerType::Single,
    ///     Arc::new(BusySpinWaitStrategy::new()),
    /// )
    /// .unwrap();
    /// ring_buffer.publish_with(|event, _| *event = "first".to_string()).unwrap();
    /// let held: &str = ring_buffer.get(0);
    /// ring_buffer.publish_with(|event, _| *event = "second".to_string()).unwrap();
    /// println!("{held}");
    /// ```
    pub unsafe fn get(&self, sequence: i64) -> &T {
        let index = (sequence & self.index_mask) as usize;
        &*self.slots.get_unchecked(index).get()
    }

    /// Get a mutable reference to the event at a claimed sequence
    ///
    /// # Safety
    /// The caller must hold `sequence` as claimed and not yet published, which
    /// gives it exclusive access to the slot. Calling this for any other
    /// sequence aliases a slot that consumers or another producer may be using.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, sequence: i64) -> &mut T {
        let index = (sequence & self.index_mask) as usize;
        &mut *self.slots.get_unchecked(index).get()
    }

    /// Publish a single claimed sequence
    pub fn publish(&self, sequence: i64) {
        self.publish_range(sequence, sequence);
    }

    /// Publish a claimed range of sequences
    ///
    /// # Arguments
    /// * `low` - The lowest sequence to publish
    /// * `high` - The highest sequence to publish
    pub fn publish_range(&self, low: i64, high: i64) {
        self.claim_strategy.publish(low, high, &self.cursor);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Claim a slot, fill it in place with `update`, and publish it
    ///
    /// The slot is published even if `update` panics, so consumers never
    /// stall behind a claimed sequence.
    ///
    /// # Returns
    /// The sequence the event was published at
    pub fn publish_with<F>(&self, update: F) -> Result<i64>
    where
        F: FnOnce(&mut T, i64),
    {
        let sequence = self.next()?;
        self.fill_and_publish(sequence, update);
        Ok(sequence)
    }

    fn fill_and_publish<F>(&self, sequence: i64, update: F)
    where
        F: FnOnce(&mut T, i64),
    {
        let _guard = PublishGuard {
            ring_buffer: self,
            low: sequence,
            high: sequence,
        };
        // SAFETY: `sequence` was just claimed by this call and is unpublished.
        update(unsafe { self.get_mut(sequence) }, sequence);
    }

    /// Publish one event populated by `translator`
    pub fn publish_event<E>(&self, translator: &E) -> Result<i64>
    where
        E: EventTranslator<T> + ?Sized,
    {
        self.publish_with(|event, sequence| translator.translate_to(event, sequence))
    }

    /// Publish one event if there is capacity, without waiting
    ///
    /// # Errors
    /// `DisruptorError::InsufficientCapacity` if the buffer is full
    pub fn try_publish_event<E>(&self, translator: &E) -> Result<i64>
    where
        E: EventTranslator<T> + ?Sized,
    {
        let sequence = self.try_next()?;
        self.fill_and_publish(sequence, |event, sequence| {
            translator.translate_to(event, sequence)
        });
        Ok(sequence)
    }

    pub fn publish_event_one_arg<A, E>(&self, translator: &E, arg0: A) -> Result<i64>
    where
        E: EventTranslatorOneArg<T, A> + ?Sized,
    {
        self.publish_with(|event, sequence| translator.translate_to(event, sequence, arg0))
    }

    pub fn publish_event_two_arg<A, B, E>(&self, translator: &E, arg0: A, arg1: B) -> Result<i64>
    where
        E: EventTranslatorTwoArg<T, A, B> + ?Sized,
    {
        self.publish_with(|event, sequence| translator.translate_to(event, sequence, arg0, arg1))
    }

    /// Claim `n` slots, fill them through a batch iterator, and publish them
    /// together
    ///
    /// # Returns
    /// The highest published sequence
    pub fn batch_publish<F>(&self, n: usize, fill: F) -> Result<i64>
    where
        F: FnOnce(BatchIterMut<'_, T>),
    {
        let high = self.next_n(n)?;
        let low = high - n as i64 + 1;
        let _guard = PublishGuard {
            ring_buffer: self,
            low,
            high,
        };
        fill(BatchIterMut::new(low, high, self));
        Ok(high)
    }

    /// True once the slot for `sequence` has been published
    pub fn is_available(&self, sequence: i64) -> bool {
        self.claim_strategy.is_available(sequence, &self.cursor)
    }

    /// Register consumer sequences the producer must not overtake
    ///
    /// Each sequence is first moved to the current cursor, so a consumer
    /// added after events were published only sees later events.
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.gating_sequences
            .add_all_at_cursor(sequences, &self.cursor);
    }

    /// Remove a consumer sequence from the gating set, by identity
    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.gating_sequences.remove(sequence)
    }

    /// Slowest gating sequence, or the cursor when nothing gates the producer
    pub fn get_minimum_gating_sequence(&self) -> i64 {
        self.gating_sequences.get_minimum_sequence(self.cursor.get())
    }

    /// Create a barrier gated on the cursor and on `sequences_to_track`
    pub fn new_barrier(&self, sequences_to_track: Vec<Arc<Sequence>>) -> ProcessingSequenceBarrier {
        ProcessingSequenceBarrier::new(
            Arc::clone(&self.cursor),
            Arc::clone(&self.wait_strategy),
            sequences_to_track,
        )
    }

    pub fn get_cursor(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    pub fn buffer_size(&self) -> usize {
        self.slots.len()
    }

    pub fn producer_type(&self) -> ProducerType {
        self.producer_type
    }

    pub fn wait_strategy(&self) -> Arc<dyn WaitStrategy> {
        Arc::clone(&self.wait_strategy)
    }

    /// Whether `required` slots could be claimed right now without waiting
    pub fn has_available_capacity(&self, required: usize) -> bool {
        self.claim_strategy
            .has_available_capacity(required, &self.gate())
    }

    /// Number of slots that could be claimed right now without waiting
    pub fn remaining_capacity(&self) -> i64 {
        let claimed = self.claim_strategy.sequence();
        let consumed = self.gating_sequences.get_minimum_sequence(claimed);
        self.slots.len() as i64 - (claimed - consumed)
    }

    /// Wake and fail producers waiting for capacity
    pub fn alert(&self) {
        self.alert.raise();
        self.wait_strategy.signal_all_when_blocking();
    }

    pub fn is_alerted(&self) -> bool {
        self.alert.is_raised()
    }
}

impl<T> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("buffer_size", &self.slots.len())
            .field("producer_type", &self.producer_type)
            .field("cursor", &self.cursor.get())
            .field("gating_sequences", &self.gating_sequences.len())
            .finish()
    }
}

/// Publishes a claimed range when dropped
struct PublishGuard<'a, T> {
    ring_buffer: &'a RingBuffer<T>,
    low: i64,
    high: i64,
}

impl<T> Drop for PublishGuard<'_, T> {
    fn drop(&mut self) {
        self.ring_buffer.publish_range(self.low, self.high);
    }
}

/// Mutable iterator over a claimed, not yet published range of slots
pub struct BatchIterMut<'a, T> {
    ring_buffer: &'a RingBuffer<T>,
    current: i64,
    last: i64,
}

impl<'a, T> BatchIterMut<'a, T> {
    fn new(start: i64, end: i64, ring_buffer: &'a RingBuffer<T>) -> Self {
        Self {
            ring_buffer,
            current: start,
            last: end,
        }
    }

    /// Sequence of the next slot the iterator will yield
    pub fn next_sequence(&self) -> i64 {
        self.current
    }

    fn remaining(&self) -> usize {
        (self.last - self.current + 1).max(0) as usize
    }
}

impl<'a, T> Iterator for BatchIterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current > self.last {
            None
        } else {
            // SAFETY: the range was claimed by `batch_publish` and each
            // sequence is yielded once, so no two references alias.
            let event = unsafe { self.ring_buffer.get_mut(self.current) };
            self.current += 1;
            Some(event)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for BatchIterMut<'_, T> {}

// SAFETY: RingBuffer<T> is Send and Sync when T is Send + Sync because:
// - Slot access is coordinated through the claim strategy and the cursor
// - A slot is written only by the producer holding its unpublished sequence
// - Publication happens-before any consumer read via the cursor's release store
unsafe impl<T: Send + Sync> Send for RingBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for RingBuffer<T> {}
