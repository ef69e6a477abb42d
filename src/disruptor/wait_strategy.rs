//! Wait Strategy Implementation
//!
//! This module provides different wait strategies for the Disruptor pattern.
//! Wait strategies determine how consumers wait for new events to become
//! available, and how producers wait for free capacity on a full buffer.

use crate::disruptor::{get_minimum_sequence, AlertFlag, DisruptorError, Result, Sequence};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Strategy for waiting for a sequence to become available
///
/// Implementations re-read the cursor and the dependent sequences on every
/// wake, so spurious wake-ups are harmless, and check the alert flag once per
/// wait cycle so that a halt is observed promptly.
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Wait until the given sequence is available
    ///
    /// Available means the cursor when `dependent_sequences` is empty, and the
    /// minimum of the dependent sequences otherwise.
    ///
    /// # Arguments
    /// * `sequence` - The sequence to wait for
    /// * `cursor` - The ring buffer cursor
    /// * `dependent_sequences` - Sequences that must have passed `sequence`
    /// * `alert` - Cancellation flag of the waiting party
    ///
    /// # Returns
    /// The highest available sequence, at least `sequence`
    ///
    /// # Errors
    /// `DisruptorError::Alert` if the flag is raised while waiting
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alert: &AlertFlag,
    ) -> Result<i64> {
        self.wait_until(sequence, cursor, dependent_sequences, alert, None)
    }

    /// Bounded variant of [`wait_for`](Self::wait_for)
    ///
    /// # Errors
    /// `DisruptorError::Timeout` once `timeout` has elapsed, or
    /// `DisruptorError::Alert` if alerted first
    fn wait_for_timeout(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alert: &AlertFlag,
        timeout: Duration,
    ) -> Result<i64> {
        let deadline = Instant::now() + timeout;
        self.wait_until(sequence, cursor, dependent_sequences, alert, Some(deadline))
    }

    /// Core wait loop with an optional deadline
    fn wait_until(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alert: &AlertFlag,
        deadline: Option<Instant>,
    ) -> Result<i64>;

    /// Wake every thread blocked in this strategy
    fn signal_all_when_blocking(&self);
}

#[inline]
fn available_sequence(cursor: &Sequence, dependent_sequences: &[Arc<Sequence>]) -> i64 {
    if dependent_sequences.is_empty() {
        cursor.get()
    } else {
        get_minimum_sequence(dependent_sequences, cursor.get())
    }
}

#[inline]
fn check_wait(alert: &AlertFlag, deadline: Option<Instant>) -> Result<()> {
    alert.check()?;
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(DisruptorError::Timeout),
        _ => Ok(()),
    }
}

/// Blocking wait strategy using a mutex and condition variable
///
/// Publishers signal on every publish. Lowest CPU usage, highest wake latency.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    /// Create a new blocking wait strategy
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_until(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alert: &AlertFlag,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        if cursor.get() < sequence {
            let mut guard = self.mutex.lock();
            // Checked under the lock so a signal between check and wait is not lost
            while cursor.get() < sequence {
                alert.check()?;
                match deadline {
                    None => self.condvar.wait(&mut guard),
                    Some(deadline) => {
                        if self.condvar.wait_until(&mut guard, deadline).timed_out()
                            && cursor.get() < sequence
                        {
                            return Err(DisruptorError::Timeout);
                        }
                    }
                }
            }
        }

        // Upstream processors do not signal; poll them
        loop {
            let available = available_sequence(cursor, dependent_sequences);
            if available >= sequence {
                return Ok(available);
            }
            check_wait(alert, deadline)?;
            thread::yield_now();
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// Default number of spins before the yielding strategy yields
const DEFAULT_SPIN_TRIES: u32 = 100;

/// Yielding wait strategy
///
/// Spins for a bounded number of tries, then yields the thread between polls.
#[derive(Debug)]
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    /// Create a new yielding wait strategy
    pub fn new() -> Self {
        Self::with_spin_tries(DEFAULT_SPIN_TRIES)
    }

    pub fn with_spin_tries(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_until(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alert: &AlertFlag,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        let mut counter = self.spin_tries;
        loop {
            let available = available_sequence(cursor, dependent_sequences);
            if available >= sequence {
                return Ok(available);
            }
            check_wait(alert, deadline)?;

            if counter == 0 {
                thread::yield_now();
            } else {
                counter -= 1;
                std::hint::spin_loop();
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Busy-spin wait strategy
///
/// Polls without ever giving up the CPU. Lowest latency, 100% of a core while
/// waiting; only use it with a core dedicated to each processor.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create a new busy-spin wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_until(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alert: &AlertFlag,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        loop {
            let available = available_sequence(cursor, dependent_sequences);
            if available >= sequence {
                return Ok(available);
            }
            check_wait(alert, deadline)?;
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

const SLEEPING_RETRIES: u32 = 200;

/// Sleeping wait strategy
///
/// Spins, then yields, then sleeps for `sleep_duration` between polls.
#[derive(Debug)]
pub struct SleepingWaitStrategy {
    sleep_duration: Duration,
}

impl SleepingWaitStrategy {
    /// Create a new sleeping wait strategy with default sleep duration
    pub fn new() -> Self {
        Self::new_with_duration(Duration::from_micros(100))
    }

    /// Create a new sleeping wait strategy with custom sleep duration
    pub fn new_with_duration(sleep_duration: Duration) -> Self {
        Self { sleep_duration }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_until(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        alert: &AlertFlag,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        let mut counter = SLEEPING_RETRIES;
        loop {
            let available = available_sequence(cursor, dependent_sequences);
            if available >= sequence {
                return Ok(available);
            }
            check_wait(alert, deadline)?;

            if counter > SLEEPING_RETRIES / 2 {
                counter -= 1;
                std::hint::spin_loop();
            } else if counter > 0 {
                counter -= 1;
                thread::yield_now();
            } else {
                thread::sleep(self.sleep_duration);
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategies() -> Vec<Arc<dyn WaitStrategy>> {
        vec![
            Arc::new(BlockingWaitStrategy::new()),
            Arc::new(YieldingWaitStrategy::new()),
            Arc::new(BusySpinWaitStrategy::new()),
            Arc::new(SleepingWaitStrategy::new_with_duration(Duration::from_micros(50))),
        ]
    }

    #[test]
    fn test_returns_immediately_when_available() {
        for strategy in strategies() {
            let cursor = Sequence::new(10);
            let result = strategy.wait_for(5, &cursor, &[], &AlertFlag::new());
            assert_eq!(result.unwrap(), 10, "{strategy:?}");
        }
    }

    #[test]
    fn test_dependencies_bound_the_result() {
        for strategy in strategies() {
            let cursor = Sequence::new(10);
            let deps = vec![Arc::new(Sequence::new(7)), Arc::new(Sequence::new(6))];
            let result = strategy.wait_for(5, &cursor, &deps, &AlertFlag::new());
            assert_eq!(result.unwrap(), 6, "{strategy:?}");
        }
    }

    #[test]
    fn test_alert_interrupts_wait() {
        for strategy in strategies() {
            let cursor = Sequence::new(-1);
            let alert = AlertFlag::new();
            alert.raise();
            let result = strategy.wait_for(0, &cursor, &[], &alert);
            assert!(matches!(result, Err(DisruptorError::Alert)), "{strategy:?}");
        }
    }

    #[test]
    fn test_timeout_expires() {
        for strategy in strategies() {
            let cursor = Sequence::new(-1);
            let result = strategy.wait_for_timeout(
                0,
                &cursor,
                &[],
                &AlertFlag::new(),
                Duration::from_millis(5),
            );
            assert!(matches!(result, Err(DisruptorError::Timeout)), "{strategy:?}");
        }
    }

    #[test]
    fn test_waiter_wakes_on_publish() {
        for strategy in strategies() {
            let cursor = Arc::new(Sequence::new(-1));
            let alert = Arc::new(AlertFlag::new());

            let waiter = {
                let strategy = Arc::clone(&strategy);
                let cursor = Arc::clone(&cursor);
                let alert = Arc::clone(&alert);
                thread::spawn(move || strategy.wait_for(0, &cursor, &[], &alert))
            };

            thread::sleep(Duration::from_millis(10));
            cursor.set(0);
            strategy.signal_all_when_blocking();

            assert_eq!(waiter.join().unwrap().unwrap(), 0);
        }
    }
}
