//! Shared fixtures for the integration tests

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use ringway::disruptor::{
    DisruptorError, EventHandler, ExceptionHandler, Executor, Result, Task,
};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TestEvent {
    pub value: i64,
    pub producer: usize,
}

/// Executor that runs tasks on plain threads and can be told to drop work
#[derive(Default)]
pub struct StubExecutor {
    ignore_execution_requests: AtomicBool,
    execution_count: AtomicUsize,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl StubExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ignore_execution_requests(&self) {
        self.ignore_execution_requests.store(true, Ordering::SeqCst);
    }

    /// Tasks accepted and actually started
    pub fn execution_count(&self) -> usize {
        self.execution_count.load(Ordering::SeqCst)
    }

    pub fn join_all(&self) {
        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for thread in threads {
            thread.join().expect("processor thread panicked");
        }
    }
}

impl Executor for StubExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        if self.ignore_execution_requests.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.execution_count.fetch_add(1, Ordering::SeqCst);
        self.threads.lock().push(thread::spawn(task));
        Ok(())
    }
}

pub fn as_executor(executor: &Arc<StubExecutor>) -> Arc<dyn Executor> {
    Arc::clone(executor) as Arc<dyn Executor>
}

/// Blocks callers until it has been counted down to zero
pub struct CountDownLatch {
    count: Mutex<usize>,
    zero: Condvar,
}

impl CountDownLatch {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            count: Mutex::new(count),
            zero: Condvar::new(),
        })
    }

    pub fn count_down(&self) {
        let mut count = self.count.lock();
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.zero.notify_all();
            }
        }
    }

    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// True if the count reached zero before the timeout
    pub fn await_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.zero.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

/// Counts down a latch for every event it sees
pub struct EventHandlerStub {
    latch: Arc<CountDownLatch>,
}

impl EventHandlerStub {
    pub fn new(latch: &Arc<CountDownLatch>) -> Self {
        Self {
            latch: Arc::clone(latch),
        }
    }
}

impl EventHandler<TestEvent> for EventHandlerStub {
    fn on_event(&mut self, _event: &TestEvent, _sequence: i64, _end_of_batch: bool) -> Result<()> {
        self.latch.count_down();
        Ok(())
    }
}

/// Test-side control for a [`DelayedEventHandler`]
#[derive(Default)]
pub struct DelayControl {
    permits: AtomicUsize,
    released: AtomicBool,
    completed: AtomicI64,
}

impl DelayControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            completed: AtomicI64::new(-1),
            ..Self::default()
        })
    }

    /// Let the handler finish one more event
    pub fn process_event(&self) {
        self.permits.fetch_add(1, Ordering::SeqCst);
    }

    /// Stop holding events back at all
    pub fn release_all(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    /// Highest sequence the handler has finished
    pub fn completed(&self) -> i64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn acquire(&self) {
        loop {
            if self.released.load(Ordering::SeqCst) {
                return;
            }
            let permits = self.permits.load(Ordering::SeqCst);
            if permits > 0
                && self
                    .permits
                    .compare_exchange(permits, permits - 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                return;
            }
            thread::yield_now();
        }
    }
}

/// Holds every event until the test hands out a permit for it
pub struct DelayedEventHandler {
    control: Arc<DelayControl>,
}

impl DelayedEventHandler {
    pub fn new(control: &Arc<DelayControl>) -> Self {
        Self {
            control: Arc::clone(control),
        }
    }
}

impl EventHandler<TestEvent> for DelayedEventHandler {
    fn on_event(&mut self, _event: &TestEvent, sequence: i64, _end_of_batch: bool) -> Result<()> {
        self.control.acquire();
        self.control.completed.store(sequence, Ordering::SeqCst);
        Ok(())
    }
}

/// The error raised by [`ExceptionThrowingHandler`], tagged so a test can
/// recognise the exact instance it receives
#[derive(Debug, thiserror::Error)]
#[error("test fault {token}")]
pub struct TestFault {
    pub token: u64,
}

/// Fails every event with a fresh [`TestFault`]
pub struct ExceptionThrowingHandler {
    next_token: u64,
    raised: Arc<Mutex<Vec<u64>>>,
}

impl ExceptionThrowingHandler {
    pub fn new(raised: &Arc<Mutex<Vec<u64>>>) -> Self {
        Self {
            next_token: 1000,
            raised: Arc::clone(raised),
        }
    }
}

impl EventHandler<TestEvent> for ExceptionThrowingHandler {
    fn on_event(&mut self, _event: &TestEvent, _sequence: i64, _end_of_batch: bool) -> Result<()> {
        self.next_token += 1;
        self.raised.lock().push(self.next_token);
        Err(DisruptorError::handler(TestFault {
            token: self.next_token,
        }))
    }
}

/// Records every fault handed to it and lets processing continue
#[derive(Default)]
pub struct StubExceptionHandler {
    pub received: Arc<Mutex<Vec<(i64, DisruptorError)>>>,
}

impl StubExceptionHandler {
    pub fn new(received: &Arc<Mutex<Vec<(i64, DisruptorError)>>>) -> Self {
        Self {
            received: Arc::clone(received),
        }
    }
}

impl ExceptionHandler<TestEvent> for StubExceptionHandler {
    fn handle_event_exception(
        &self,
        error: DisruptorError,
        sequence: i64,
        _event: &TestEvent,
    ) -> Result<()> {
        self.received.lock().push((sequence, error));
        Ok(())
    }
}

/// A handler whose equality claims every instance is the same handler
pub struct EvilEqualsHandler;

impl PartialEq for EvilEqualsHandler {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl EventHandler<TestEvent> for EvilEqualsHandler {
    fn on_event(&mut self, _event: &TestEvent, _sequence: i64, _end_of_batch: bool) -> Result<()> {
        Ok(())
    }
}

/// Token carried by a [`TestFault`], if `error` is one
pub fn fault_token(error: &DisruptorError) -> Option<u64> {
    match error {
        DisruptorError::Handler(inner) => inner.downcast_ref::<TestFault>().map(|fault| fault.token),
        _ => None,
    }
}

/// Spin until `condition` holds or two seconds pass
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::yield_now();
    }
    true
}
