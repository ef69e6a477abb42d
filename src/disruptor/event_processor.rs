//! Event Processor implementation for the Disruptor
//!
//! Event processors drive an event handler from the ring buffer. They wait on
//! a sequence barrier, hand every available event to the handler in order,
//! and then publish their own sequence so downstream stages can proceed.

use crate::disruptor::{
    DisruptorError, EventHandler, ExceptionHandler, FatalExceptionHandler, Result, RingBuffer,
    Sequence, SequenceBarrier,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifecycle of an event processor; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorState {
    Idle = 0,
    Running = 1,
    Halted = 2,
}

impl ProcessorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessorState::Idle,
            1 => ProcessorState::Running,
            _ => ProcessorState::Halted,
        }
    }
}

/// Cloneable handle for halting a processor that has been moved elsewhere
#[derive(Clone)]
pub struct ProcessorControl {
    state: Arc<AtomicU8>,
    barrier: Arc<dyn SequenceBarrier>,
    sequence: Arc<Sequence>,
}

impl ProcessorControl {
    /// Request the processor to stop
    ///
    /// Moves the state to `Halted` and alerts the barrier, so a processor
    /// blocked waiting for events notices within one wait cycle. The current
    /// batch, if any, is finished first.
    pub fn halt(&self) {
        self.state
            .store(ProcessorState::Halted as u8, Ordering::SeqCst);
        self.barrier.alert();
    }

    pub fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessorState::Running
    }

    /// The sequence of the last event this processor fully handled
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }
}

impl std::fmt::Debug for ProcessorControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorControl")
            .field("state", &self.state())
            .field("sequence", &self.sequence.get())
            .finish()
    }
}

/// A unit of work that consumes events until halted
pub trait EventProcessor: Send {
    /// Get the sequence being tracked by this processor
    fn get_sequence(&self) -> Arc<Sequence>;

    /// Handle for halting the processor after it has been moved to a thread
    fn control(&self) -> ProcessorControl;

    /// Halt the event processor
    fn halt(&self) {
        self.control().halt();
    }

    /// Check if the processor is running
    fn is_running(&self) -> bool {
        self.control().is_running()
    }

    /// Run the event processor on the calling thread until it halts
    ///
    /// # Errors
    /// `DisruptorError::ProcessorAlreadyRunning` if another thread is running
    /// it, or the fatal error that stopped it
    fn run(&mut self) -> Result<()>;
}

/// Processes every available event in a batch, then advances its sequence
pub struct BatchEventProcessor<T> {
    ring_buffer: Arc<RingBuffer<T>>,
    sequence: Arc<Sequence>,
    barrier: Arc<dyn SequenceBarrier>,
    handler: Box<dyn EventHandler<T>>,
    exception_handler: Arc<dyn ExceptionHandler<T>>,
    state: Arc<AtomicU8>,
    timeout: Option<Duration>,
}

impl<T> BatchEventProcessor<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new batch event processor
    ///
    /// # Arguments
    /// * `ring_buffer` - The buffer to read events from
    /// * `barrier` - Gates this processor on the cursor and its dependencies
    /// * `handler` - Receives every event in sequence order
    pub fn new(
        ring_buffer: Arc<RingBuffer<T>>,
        barrier: Arc<dyn SequenceBarrier>,
        handler: Box<dyn EventHandler<T>>,
    ) -> Self {
        Self {
            ring_buffer,
            sequence: Arc::new(Sequence::new_with_initial_value()),
            barrier,
            handler,
            exception_handler: Arc::new(FatalExceptionHandler::new()),
            state: Arc::new(AtomicU8::new(ProcessorState::Idle as u8)),
            timeout: None,
        }
    }

    pub fn set_exception_handler(&mut self, exception_handler: Arc<dyn ExceptionHandler<T>>) {
        self.exception_handler = exception_handler;
    }

    /// Bound each barrier wait; the handler's `on_timeout` runs on expiry
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    fn load_state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn process_events(&mut self) -> Result<()> {
        let mut next_sequence = self.sequence.get() + 1;

        loop {
            let waited = match self.timeout {
                Some(timeout) => self.barrier.wait_for_timeout(next_sequence, timeout),
                None => self.barrier.wait_for(next_sequence),
            };

            match waited {
                Ok(available_sequence) => {
                    while next_sequence <= available_sequence {
                        // SAFETY: the barrier reported `next_sequence` as published,
                        // and our own sequence gates the producer off this slot
                        // until the batch is done.
                        let event = unsafe { self.ring_buffer.get(next_sequence) };
                        let end_of_batch = next_sequence == available_sequence;

                        if let Err(error) = self.handler.on_event(event, next_sequence, end_of_batch)
                        {
                            if let Err(fatal) = self
                                .exception_handler
                                .handle_event_exception(error, next_sequence, event)
                            {
                                self.sequence.set(next_sequence - 1);
                                return Err(fatal);
                            }
                        }
                        next_sequence += 1;
                    }
                    self.sequence.set(available_sequence);
                }
                Err(DisruptorError::Timeout) => {
                    if let Err(error) = self.handler.on_timeout(self.sequence.get()) {
                        warn!(%error, sequence = self.sequence.get(), "timeout notification failed");
                    }
                }
                Err(DisruptorError::Alert) => {
                    if self.load_state() == ProcessorState::Halted {
                        return Ok(());
                    }
                    // Alerted without a halt; a halt racing with the clear is
                    // caught by re-reading the state afterwards.
                    self.barrier.clear_alert();
                    if self.load_state() == ProcessorState::Halted {
                        return Ok(());
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl<T> EventProcessor for BatchEventProcessor<T>
where
    T: Send + Sync + 'static,
{
    fn get_sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }

    fn control(&self) -> ProcessorControl {
        ProcessorControl {
            state: Arc::clone(&self.state),
            barrier: Arc::clone(&self.barrier),
            sequence: Arc::clone(&self.sequence),
        }
    }

    fn run(&mut self) -> Result<()> {
        if let Err(current) = self.state.compare_exchange(
            ProcessorState::Idle as u8,
            ProcessorState::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            if ProcessorState::from_u8(current) == ProcessorState::Running {
                return Err(DisruptorError::ProcessorAlreadyRunning);
            }
            debug!("processor halted before it was started");
            return Ok(());
        }

        if let Err(error) = self.handler.on_start() {
            self.exception_handler.handle_on_start_exception(error);
        }
        debug!(sequence = self.sequence.get(), "event processor started");

        let result = self.process_events();
        self.state
            .store(ProcessorState::Halted as u8, Ordering::SeqCst);

        if let Err(error) = self.handler.on_shutdown() {
            self.exception_handler.handle_on_shutdown_exception(error);
        }
        debug!(sequence = self.sequence.get(), "event processor stopped");

        result
    }
}
