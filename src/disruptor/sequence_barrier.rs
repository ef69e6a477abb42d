//! Sequence Barrier Implementation
//!
//! This module provides sequence barriers for coordinating dependencies between
//! event processors in the Disruptor pattern. Sequence barriers ensure that
//! consumers don't process events until their dependencies have been satisfied.

use crate::disruptor::{DisruptorError, Result, Sequence, WaitStrategy};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative cancellation flag observed by wait strategies
///
/// Raising the flag never interrupts a thread; waiters notice it at their next
/// wait-cycle boundary and unwind with [`DisruptorError::Alert`].
#[derive(Debug, Default)]
pub struct AlertFlag {
    alerted: CachePadded<AtomicBool>,
}

impl AlertFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.alerted.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.alerted.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    /// `Err(Alert)` once raised
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_raised() {
            Err(DisruptorError::Alert)
        } else {
            Ok(())
        }
    }
}

/// Coordination barrier for managing dependencies between event processors
///
/// A barrier computes the highest sequence that is safe to consume: the
/// minimum of the ring buffer cursor and every dependency sequence. Stage
/// ordering needs nothing more than this, so no queues sit between stages.
pub trait SequenceBarrier: Send + Sync {
    /// Wait for the given sequence to become available
    ///
    /// # Returns
    /// The highest available sequence, which may be higher than requested
    ///
    /// # Errors
    /// Returns `DisruptorError::Alert` if the barrier is alerted while waiting
    fn wait_for(&self, sequence: i64) -> Result<i64>;

    /// Wait for the given sequence, giving up with `DisruptorError::Timeout`
    /// once `timeout` elapses
    fn wait_for_timeout(&self, sequence: i64, timeout: Duration) -> Result<i64>;

    /// Get the cursor sequence that this barrier is tracking
    fn get_cursor(&self) -> Arc<Sequence>;

    /// Check if this barrier has been alerted
    fn is_alerted(&self) -> bool;

    /// Alert this barrier to wake up any waiting threads
    fn alert(&self);

    /// Clear the alert status
    fn clear_alert(&self);

    /// Returns `DisruptorError::Alert` if the barrier has been alerted
    fn check_alert(&self) -> Result<()>;
}

/// Standard implementation of a sequence barrier
///
/// Gates on the ring buffer cursor alone when `dependent_sequences` is empty,
/// otherwise on the slowest of the upstream processors it depends on.
#[derive(Debug)]
pub struct ProcessingSequenceBarrier {
    /// The ring buffer cursor
    cursor: Arc<Sequence>,
    /// The wait strategy to use when waiting for sequences
    wait_strategy: Arc<dyn WaitStrategy>,
    /// Sequences that this barrier depends on
    dependent_sequences: Vec<Arc<Sequence>>,
    alert: AlertFlag,
}

impl ProcessingSequenceBarrier {
    /// Create a new processing sequence barrier
    ///
    /// # Arguments
    /// * `cursor` - The cursor sequence to track
    /// * `wait_strategy` - The wait strategy to use
    /// * `dependent_sequences` - Sequences that this barrier depends on
    pub fn new(
        cursor: Arc<Sequence>,
        wait_strategy: Arc<dyn WaitStrategy>,
        dependent_sequences: Vec<Arc<Sequence>>,
    ) -> Self {
        Self {
            cursor,
            wait_strategy,
            dependent_sequences,
            alert: AlertFlag::new(),
        }
    }

    pub fn dependent_sequences(&self) -> &[Arc<Sequence>] {
        &self.dependent_sequences
    }
}

impl SequenceBarrier for ProcessingSequenceBarrier {
    fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.check_alert()?;
        self.wait_strategy.wait_for(
            sequence,
            &self.cursor,
            &self.dependent_sequences,
            &self.alert,
        )
    }

    fn wait_for_timeout(&self, sequence: i64, timeout: Duration) -> Result<i64> {
        self.check_alert()?;
        self.wait_strategy.wait_for_timeout(
            sequence,
            &self.cursor,
            &self.dependent_sequences,
            &self.alert,
            timeout,
        )
    }

    fn get_cursor(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    fn is_alerted(&self) -> bool {
        self.alert.is_raised()
    }

    fn alert(&self) {
        self.alert.raise();
        self.wait_strategy.signal_all_when_blocking();
    }

    fn clear_alert(&self) {
        self.alert.clear();
    }

    fn check_alert(&self) -> Result<()> {
        self.alert.check()
    }
}
