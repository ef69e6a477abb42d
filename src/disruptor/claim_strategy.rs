//! Claim Strategy Implementation
//!
//! Claim strategies decide how producers reserve slots in the ring buffer and
//! how publication becomes visible through the cursor. The choice between the
//! single and multi producer variant is fixed when the ring buffer is built.

use crate::disruptor::{AlertFlag, DisruptorError, Result, Sequence, SequenceGroup, WaitStrategy};
use std::sync::atomic::{AtomicI32, Ordering};

/// View of the consumer side a claim strategy must respect
///
/// Bundles the gating sequences with the wait strategy and alert flag used
/// while a producer waits for free capacity.
pub struct CapacityGate<'a> {
    pub cursor: &'a Sequence,
    pub gating_sequences: &'a SequenceGroup,
    pub wait_strategy: &'a dyn WaitStrategy,
    pub alert: &'a AlertFlag,
}

impl CapacityGate<'_> {
    /// Slowest gating sequence, or `default` when nothing gates the producer
    pub fn minimum(&self, default: i64) -> i64 {
        self.gating_sequences.get_minimum_sequence(default)
    }

    /// Wait until every gating sequence has reached `wrap_point`
    ///
    /// # Returns
    /// The minimum gating sequence observed, or `default` if there are none
    ///
    /// # Errors
    /// `DisruptorError::Alert` if the producer side is alerted while waiting
    pub fn wait_for(&self, wrap_point: i64, default: i64) -> Result<i64> {
        let gating = self.gating_sequences.snapshot();
        if gating.is_empty() {
            return Ok(default);
        }
        self.wait_strategy
            .wait_for(wrap_point, self.cursor, &gating, self.alert)
    }
}

/// Strategy used by producers to claim and publish slots
pub trait ClaimStrategy: Send + Sync + std::fmt::Debug {
    /// Get the buffer size
    fn buffer_size(&self) -> usize;

    /// Highest sequence claimed so far (not necessarily published)
    fn sequence(&self) -> i64;

    /// Whether `required` more slots could be claimed without wrapping
    fn has_available_capacity(&self, required: usize, gate: &CapacityGate<'_>) -> bool;

    /// Claim the next `n` slots, waiting for capacity if the buffer is full
    ///
    /// # Returns
    /// The highest sequence of the claimed range
    ///
    /// # Errors
    /// `DisruptorError::Alert` if the gate is alerted while waiting
    fn next(&self, n: usize, gate: &CapacityGate<'_>) -> Result<i64>;

    /// Claim the next `n` slots without waiting
    ///
    /// # Errors
    /// `DisruptorError::InsufficientCapacity` if the buffer is full
    fn try_next(&self, n: usize, gate: &CapacityGate<'_>) -> Result<i64>;

    /// Make `low..=high` visible to consumers by advancing `cursor`
    fn publish(&self, low: i64, high: i64, cursor: &Sequence);

    /// True once the slot for `sequence` has been published
    fn is_available(&self, sequence: i64, cursor: &Sequence) -> bool;
}

/// Claim strategy for a single producer thread
///
/// Performs no synchronization on the claim path. Only one thread may ever
/// call `next`/`publish` on a ring buffer built with this strategy; using it
/// from several producers at once is a contract violation and is not detected.
#[derive(Debug)]
pub struct SingleThreadedClaimStrategy {
    buffer_size: usize,
    claim_sequence: Sequence,
    cached_gating_sequence: Sequence,
}

impl SingleThreadedClaimStrategy {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            claim_sequence: Sequence::new_with_initial_value(),
            cached_gating_sequence: Sequence::new_with_initial_value(),
        }
    }

    fn has_capacity(&self, required: usize, current: i64, gate: &CapacityGate<'_>) -> bool {
        let wrap_point = current + required as i64 - self.buffer_size as i64;
        let cached = self.cached_gating_sequence.get();

        if wrap_point > cached || cached > current {
            let min_sequence = gate.minimum(current);
            self.cached_gating_sequence.set(min_sequence);
            if wrap_point > min_sequence {
                return false;
            }
        }
        true
    }
}

impl ClaimStrategy for SingleThreadedClaimStrategy {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn sequence(&self) -> i64 {
        self.claim_sequence.get()
    }

    fn has_available_capacity(&self, required: usize, gate: &CapacityGate<'_>) -> bool {
        self.has_capacity(required, self.claim_sequence.get(), gate)
    }

    fn next(&self, n: usize, gate: &CapacityGate<'_>) -> Result<i64> {
        let current = self.claim_sequence.get();
        let next_sequence = current + n as i64;
        let wrap_point = next_sequence - self.buffer_size as i64;
        let cached = self.cached_gating_sequence.get();

        if wrap_point > cached || cached > current {
            let min_sequence = gate.wait_for(wrap_point, current)?;
            self.cached_gating_sequence.set(min_sequence);
        }

        self.claim_sequence.set(next_sequence);
        Ok(next_sequence)
    }

    fn try_next(&self, n: usize, gate: &CapacityGate<'_>) -> Result<i64> {
        let current = self.claim_sequence.get();
        if !self.has_capacity(n, current, gate) {
            return Err(DisruptorError::InsufficientCapacity);
        }
        let next_sequence = current + n as i64;
        self.claim_sequence.set(next_sequence);
        Ok(next_sequence)
    }

    fn publish(&self, _low: i64, high: i64, cursor: &Sequence) {
        cursor.set(high);
    }

    fn is_available(&self, sequence: i64, cursor: &Sequence) -> bool {
        sequence <= cursor.get()
    }
}

/// Claim strategy safe for any number of concurrent producers
///
/// Claims are a fetch-and-add on a shared counter, so concurrent producers get
/// disjoint ranges. Each slot carries the lap number of the sequence last
/// published into it; the cursor only moves across slots whose flag matches
/// the expected lap, so it never advances past a claimed but unpublished gap.
#[derive(Debug)]
pub struct MultiThreadedClaimStrategy {
    buffer_size: usize,
    index_mask: i64,
    index_shift: u32,
    claim_sequence: Sequence,
    cached_gating_sequence: Sequence,
    available_buffer: Box<[AtomicI32]>,
}

impl MultiThreadedClaimStrategy {
    /// `buffer_size` must be a power of two
    pub fn new(buffer_size: usize) -> Self {
        let available_buffer = (0..buffer_size).map(|_| AtomicI32::new(-1)).collect();

        Self {
            buffer_size,
            index_mask: buffer_size as i64 - 1,
            index_shift: buffer_size.trailing_zeros(),
            claim_sequence: Sequence::new_with_initial_value(),
            cached_gating_sequence: Sequence::new_with_initial_value(),
            available_buffer,
        }
    }

    #[inline]
    fn calculate_index(&self, sequence: i64) -> usize {
        (sequence & self.index_mask) as usize
    }

    #[inline]
    fn calculate_availability_flag(&self, sequence: i64) -> i32 {
        (sequence >> self.index_shift) as i32
    }

    fn set_available(&self, sequence: i64) {
        let index = self.calculate_index(sequence);
        let flag = self.calculate_availability_flag(sequence);
        self.available_buffer[index].store(flag, Ordering::SeqCst);
    }

    fn is_published(&self, sequence: i64) -> bool {
        let index = self.calculate_index(sequence);
        let flag = self.calculate_availability_flag(sequence);
        self.available_buffer[index].load(Ordering::SeqCst) == flag
    }

    fn has_capacity(&self, required: usize, current: i64, gate: &CapacityGate<'_>) -> bool {
        let wrap_point = current + required as i64 - self.buffer_size as i64;
        let cached = self.cached_gating_sequence.get();

        if wrap_point > cached || cached > current {
            let min_sequence = gate.minimum(current);
            self.cached_gating_sequence.set(min_sequence);
            if wrap_point > min_sequence {
                return false;
            }
        }
        true
    }
}

impl ClaimStrategy for MultiThreadedClaimStrategy {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn sequence(&self) -> i64 {
        self.claim_sequence.get()
    }

    fn has_available_capacity(&self, required: usize, gate: &CapacityGate<'_>) -> bool {
        self.has_capacity(required, self.claim_sequence.get(), gate)
    }

    fn next(&self, n: usize, gate: &CapacityGate<'_>) -> Result<i64> {
        let next_sequence = self.claim_sequence.add_and_get(n as i64);
        let current = next_sequence - n as i64;
        let wrap_point = next_sequence - self.buffer_size as i64;

        if wrap_point > self.cached_gating_sequence.get() {
            let min_sequence = gate.wait_for(wrap_point, current)?;
            self.cached_gating_sequence.set(min_sequence);
        }

        Ok(next_sequence)
    }

    fn try_next(&self, n: usize, gate: &CapacityGate<'_>) -> Result<i64> {
        loop {
            let current = self.claim_sequence.get();
            let next_sequence = current + n as i64;

            if !self.has_capacity(n, current, gate) {
                return Err(DisruptorError::InsufficientCapacity);
            }
            if self.claim_sequence.compare_and_set(current, next_sequence) {
                return Ok(next_sequence);
            }
        }
    }

    fn publish(&self, low: i64, high: i64, cursor: &Sequence) {
        for sequence in low..=high {
            self.set_available(sequence);
        }

        // Whoever publishes last carries the cursor across every contiguous
        // published slot, including those of slower producers.
        loop {
            let current = cursor.get();
            let mut highest = current;
            while self.is_published(highest + 1) {
                highest += 1;
            }
            if highest == current {
                break;
            }
            cursor.compare_and_set(current, highest);
        }
    }

    fn is_available(&self, sequence: i64, _cursor: &Sequence) -> bool {
        self.is_published(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::BusySpinWaitStrategy;
    use std::sync::Arc;
    use std::thread;

    struct Fixture {
        cursor: Sequence,
        gating: SequenceGroup,
        wait_strategy: BusySpinWaitStrategy,
        alert: AlertFlag,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                cursor: Sequence::new_with_initial_value(),
                gating: SequenceGroup::new(),
                wait_strategy: BusySpinWaitStrategy,
                alert: AlertFlag::new(),
            }
        }

        fn gate(&self) -> CapacityGate<'_> {
            CapacityGate {
                cursor: &self.cursor,
                gating_sequences: &self.gating,
                wait_strategy: &self.wait_strategy,
                alert: &self.alert,
            }
        }
    }

    #[test]
    fn test_single_threaded_claim_and_publish() {
        let fixture = Fixture::new();
        let strategy = SingleThreadedClaimStrategy::new(8);

        assert_eq!(strategy.next(1, &fixture.gate()).unwrap(), 0);
        assert_eq!(strategy.next(3, &fixture.gate()).unwrap(), 3);
        assert_eq!(strategy.sequence(), 3);
        assert!(!strategy.is_available(0, &fixture.cursor));

        strategy.publish(0, 3, &fixture.cursor);
        assert_eq!(fixture.cursor.get(), 3);
        assert!(strategy.is_available(3, &fixture.cursor));
    }

    #[test]
    fn test_single_threaded_try_next_respects_gating() {
        let fixture = Fixture::new();
        let consumer = Arc::new(Sequence::new_with_initial_value());
        fixture.gating.add(consumer.clone());
        let strategy = SingleThreadedClaimStrategy::new(4);

        assert_eq!(strategy.try_next(4, &fixture.gate()).unwrap(), 3);
        assert!(!strategy.has_available_capacity(1, &fixture.gate()));
        assert!(matches!(
            strategy.try_next(1, &fixture.gate()),
            Err(DisruptorError::InsufficientCapacity)
        ));

        consumer.set(0);
        assert!(strategy.has_available_capacity(1, &fixture.gate()));
        assert_eq!(strategy.try_next(1, &fixture.gate()).unwrap(), 4);
    }

    #[test]
    fn test_next_on_full_buffer_observes_alert() {
        let fixture = Fixture::new();
        fixture.gating.add(Arc::new(Sequence::new_with_initial_value()));
        let strategy = MultiThreadedClaimStrategy::new(2);

        strategy.next(2, &fixture.gate()).unwrap();
        fixture.alert.raise();
        assert!(matches!(
            strategy.next(1, &fixture.gate()),
            Err(DisruptorError::Alert)
        ));
    }

    #[test]
    fn test_multi_threaded_cursor_does_not_skip_gap() {
        let fixture = Fixture::new();
        let strategy = MultiThreadedClaimStrategy::new(8);

        let first = strategy.next(1, &fixture.gate()).unwrap();
        let second = strategy.next(1, &fixture.gate()).unwrap();
        assert_eq!((first, second), (0, 1));

        strategy.publish(second, second, &fixture.cursor);
        assert!(strategy.is_available(second, &fixture.cursor));
        assert!(!strategy.is_available(first, &fixture.cursor));
        assert_eq!(fixture.cursor.get(), -1);

        strategy.publish(first, first, &fixture.cursor);
        assert_eq!(fixture.cursor.get(), 1);
    }

    #[test]
    fn test_multi_threaded_availability_distinguishes_laps() {
        let fixture = Fixture::new();
        let strategy = MultiThreadedClaimStrategy::new(4);

        let high = strategy.next(4, &fixture.gate()).unwrap();
        strategy.publish(0, high, &fixture.cursor);
        assert!(strategy.is_available(2, &fixture.cursor));
        // Same slot, next lap
        assert!(!strategy.is_available(6, &fixture.cursor));
    }

    #[test]
    fn test_multi_threaded_concurrent_claims_are_disjoint() {
        let fixture = Arc::new(Fixture::new());
        let strategy = Arc::new(MultiThreadedClaimStrategy::new(1024));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let fixture = Arc::clone(&fixture);
                let strategy = Arc::clone(&strategy);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| {
                            let sequence = strategy.next(1, &fixture.gate()).unwrap();
                            strategy.publish(sequence, sequence, &fixture.cursor);
                            sequence
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut claimed: Vec<i64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        claimed.sort_unstable();

        assert_eq!(claimed, (0..400).collect::<Vec<_>>());
        assert_eq!(fixture.cursor.get(), 399);
    }
}
