//! Disruptor Main Class Implementation
//!
//! The entry point for wiring a ring buffer to its consumers. Handlers are
//! registered as stages of an explicit dependency graph (`add_stage`), either
//! directly or through the fluent [`EventHandlerGroup`] wrapper, and are
//! handed to an [`Executor`] when the Disruptor starts.

use crate::disruptor::consumer_repository::PendingProcessor;
use crate::disruptor::{
    BatchEventProcessor, BlockingWaitStrategy, ConsumerRepository, DisruptorConfig,
    DisruptorError, EventFactory, EventHandler, EventHandlerGroup, EventProcessor,
    EventTranslator, ExceptionHandler, Executor, HandlerId, ProducerType, Result, RingBuffer,
    Sequence, SequenceBarrier, ThreadedExecutor, WaitStrategy,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Lifecycle of a Disruptor; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    Halted,
}

/// The main Disruptor class
///
/// # Type Parameters
/// * `T` - The event type stored in the ring buffer
///
/// # Examples
/// ```
/// use ringway::disruptor::{ClosureEventHandler, DefaultEventFactory, Disruptor};
/// use std::time::Duration;
///
/// let mut disruptor = Disruptor::with_defaults(DefaultEventFactory::<i64>::new(), 64).unwrap();
/// disruptor
///     .handle_events_with(ClosureEventHandler::new(|_event: &i64, _sequence, _end_of_batch| Ok(())))
///     .unwrap();
///
/// let ring_buffer = disruptor.start().unwrap();
/// ring_buffer.publish_with(|event, sequence| *event = sequence * 2).unwrap();
/// disruptor.shutdown(Duration::from_secs(1)).unwrap();
/// ```
pub struct Disruptor<T>
where
    T: Send + Sync + 'static,
{
    ring_buffer: Arc<RingBuffer<T>>,
    executor: Arc<dyn Executor>,
    consumers: ConsumerRepository<T>,
    default_exception_handler: Option<Arc<dyn ExceptionHandler<T>>>,
    processor_timeout: Option<Duration>,
    state: LifecycleState,
}

impl<T> Disruptor<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new Disruptor
    ///
    /// # Arguments
    /// * `event_factory` - Pre-populates every ring buffer slot
    /// * `buffer_size` - Size of the ring buffer (must be a power of 2)
    /// * `producer_type` - Whether one or many threads publish
    /// * `wait_strategy` - How processors and blocked producers wait
    /// * `executor` - Runs one processor loop per registered handler
    ///
    /// # Errors
    /// Returns an error if the buffer size is invalid
    pub fn new<F>(
        event_factory: F,
        buffer_size: usize,
        producer_type: ProducerType,
        wait_strategy: Arc<dyn WaitStrategy>,
        executor: Arc<dyn Executor>,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        let ring_buffer = Arc::new(RingBuffer::new(
            buffer_size,
            event_factory,
            producer_type,
            wait_strategy,
        )?);

        Ok(Self {
            ring_buffer,
            executor,
            consumers: ConsumerRepository::new(),
            default_exception_handler: None,
            processor_timeout: None,
            state: LifecycleState::NotStarted,
        })
    }

    /// Single producer, blocking wait strategy, one thread per processor
    pub fn with_defaults<F>(event_factory: F, buffer_size: usize) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        Self::new(
            event_factory,
            buffer_size,
            ProducerType::Single,
            Arc::new(BlockingWaitStrategy::new()),
            Arc::new(ThreadedExecutor::new()),
        )
    }

    /// Build a Disruptor from validated configuration
    ///
    /// Processors run on a [`ThreadedExecutor`] named and pinned as configured.
    pub fn from_config<F>(config: &DisruptorConfig, event_factory: F) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        config.validate()?;
        let mut disruptor = Self::new(
            event_factory,
            config.buffer_size,
            config.producer_type,
            config.build_wait_strategy(),
            Arc::new(config.build_executor()?),
        )?;
        disruptor.processor_timeout = config.processor_timeout();
        Ok(disruptor)
    }

    /// Bound the barrier wait of processors registered after this call
    pub fn set_processor_timeout(&mut self, timeout: Duration) {
        self.processor_timeout = Some(timeout);
    }

    fn ensure_not_started(&self) -> Result<()> {
        match self.state {
            LifecycleState::NotStarted => Ok(()),
            LifecycleState::Running => Err(DisruptorError::AlreadyStarted),
            LifecycleState::Halted => Err(DisruptorError::Shutdown),
        }
    }

    pub(crate) fn sequences_for(&self, handler_ids: &[HandlerId]) -> Result<Vec<Arc<Sequence>>> {
        handler_ids
            .iter()
            .map(|id| self.consumers.sequence_for(id))
            .collect()
    }

    /// Register one processor per handler, gated on `dependencies`
    ///
    /// With no dependencies the new processors are gated on the ring buffer
    /// cursor only. The producer stops throttling against the dependencies
    /// and throttles against the new processors instead, since they can be
    /// no further ahead.
    ///
    /// # Errors
    /// `HandlerNotRegistered` if a dependency is unknown to this Disruptor,
    /// `AlreadyStarted` or `Shutdown` once the Disruptor has left `NotStarted`
    pub fn add_stage(
        &mut self,
        dependencies: &[HandlerId],
        handlers: Vec<Box<dyn EventHandler<T>>>,
    ) -> Result<Vec<HandlerId>> {
        self.ensure_not_started()?;
        let barrier_sequences = self.sequences_for(dependencies)?;
        if handlers.is_empty() {
            return Ok(Vec::new());
        }

        let mut handler_ids = Vec::with_capacity(handlers.len());
        let mut processor_sequences = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let barrier: Arc<dyn SequenceBarrier> =
                Arc::new(self.ring_buffer.new_barrier(barrier_sequences.clone()));
            let mut processor =
                BatchEventProcessor::new(Arc::clone(&self.ring_buffer), Arc::clone(&barrier), handler);
            if let Some(timeout) = self.processor_timeout {
                processor.set_timeout(timeout);
            }
            processor_sequences.push(processor.get_sequence());
            handler_ids.push(self.consumers.add(processor, barrier));
        }

        self.ring_buffer.add_gating_sequences(&processor_sequences);
        for (id, sequence) in dependencies.iter().zip(&barrier_sequences) {
            self.ring_buffer.remove_gating_sequence(sequence);
            self.consumers.unmark_end_of_chain(id)?;
        }

        debug!(
            handlers = handler_ids.len(),
            dependencies = dependencies.len(),
            "registered processing stage"
        );
        Ok(handler_ids)
    }

    /// Register a handler gated directly on the ring buffer cursor
    pub fn handle_events_with<H>(&mut self, handler: H) -> Result<EventHandlerGroup<'_, T>>
    where
        H: EventHandler<T> + 'static,
    {
        self.handle_events_with_all(vec![Box::new(handler)])
    }

    /// Register handlers that run in parallel, gated on the cursor
    pub fn handle_events_with_all(
        &mut self,
        handlers: Vec<Box<dyn EventHandler<T>>>,
    ) -> Result<EventHandlerGroup<'_, T>> {
        let handler_ids = self.add_stage(&[], handlers)?;
        Ok(EventHandlerGroup::new(self, handler_ids))
    }

    /// Start a group from already registered handlers
    ///
    /// Handlers added through the returned group wait for every handler in
    /// `handler_ids`.
    ///
    /// # Errors
    /// `HandlerNotRegistered` for an id this Disruptor did not mint
    pub fn after(&mut self, handler_ids: &[HandlerId]) -> Result<EventHandlerGroup<'_, T>> {
        self.ensure_not_started()?;
        self.sequences_for(handler_ids)?;
        Ok(EventHandlerGroup::new(self, handler_ids.to_vec()))
    }

    /// Exception policy for processors without their own override
    pub fn handle_exceptions_with<E>(&mut self, exception_handler: E)
    where
        E: ExceptionHandler<T> + 'static,
    {
        self.default_exception_handler = Some(Arc::new(exception_handler));
    }

    /// Exception policy for a single processor
    pub fn handle_exceptions_for<E>(&mut self, handler_id: &HandlerId, exception_handler: E) -> Result<()>
    where
        E: ExceptionHandler<T> + 'static,
    {
        self.consumers
            .set_exception_handler(handler_id, Arc::new(exception_handler))
    }

    /// Hand every processor to the executor and return the ring buffer
    ///
    /// # Errors
    /// `AlreadyStarted` on a second call, `Shutdown` after a halt, or the
    /// executor's error if a processor could not be scheduled (the Disruptor
    /// is then halted)
    pub fn start(&mut self) -> Result<Arc<RingBuffer<T>>> {
        self.ensure_not_started()?;
        self.state = LifecycleState::Running;

        let pending = self.consumers.take_processors();
        let processor_count = pending.len();
        for PendingProcessor {
            id,
            mut processor,
            exception_handler,
        } in pending
        {
            if let Some(exception_handler) =
                exception_handler.or_else(|| self.default_exception_handler.clone())
            {
                processor.set_exception_handler(exception_handler);
            }

            let scheduled = self.executor.execute(Box::new(move || {
                if let Err(error) = processor.run() {
                    error!(handler = %id, %error, "event processor stopped with an error");
                }
            }));
            if let Err(error) = scheduled {
                self.halt();
                return Err(error);
            }
        }

        info!(
            processors = processor_count,
            buffer_size = self.ring_buffer.buffer_size(),
            producer_type = %self.ring_buffer.producer_type(),
            "disruptor started"
        );
        Ok(Arc::clone(&self.ring_buffer))
    }

    /// Stop every processor and release blocked producers
    ///
    /// Processors finish their current batch first. Calling this again has
    /// no further effect.
    pub fn halt(&mut self) {
        if self.state == LifecycleState::Halted {
            return;
        }
        self.consumers.halt_all();
        self.ring_buffer.alert();
        self.state = LifecycleState::Halted;
        info!(cursor = self.ring_buffer.get_cursor().get(), "disruptor halted");
    }

    /// Wait until every published event has been fully processed, then halt
    ///
    /// # Errors
    /// `DisruptorError::Timeout` if the backlog is not drained in time; the
    /// Disruptor keeps running in that case
    pub fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.has_backlog() {
            if Instant::now() >= deadline {
                return Err(DisruptorError::Timeout);
            }
            thread::yield_now();
        }
        self.halt();
        Ok(())
    }

    fn has_backlog(&self) -> bool {
        let cursor = self.ring_buffer.get_cursor().get();
        self.consumers
            .end_of_chain_sequences()
            .iter()
            .any(|sequence| sequence.get() < cursor)
    }

    /// Publish one event through the ring buffer
    pub fn publish_event<E>(&self, translator: &E) -> Result<i64>
    where
        E: EventTranslator<T> + ?Sized,
    {
        self.ring_buffer.publish_event(translator)
    }

    pub fn get_ring_buffer(&self) -> Arc<RingBuffer<T>> {
        Arc::clone(&self.ring_buffer)
    }

    /// Highest published sequence
    pub fn cursor(&self) -> i64 {
        self.ring_buffer.get_cursor().get()
    }

    pub fn buffer_size(&self) -> usize {
        self.ring_buffer.buffer_size()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Last sequence fully processed by a handler
    pub fn sequence_value_for(&self, handler_id: &HandlerId) -> Result<i64> {
        self.consumers
            .sequence_for(handler_id)
            .map(|sequence| sequence.get())
    }

    pub fn barrier_for(&self, handler_id: &HandlerId) -> Result<Arc<dyn SequenceBarrier>> {
        self.consumers.barrier_for(handler_id)
    }

    pub fn handler_ids(&self) -> Vec<HandlerId> {
        self.consumers.handler_ids()
    }
}

impl<T> Drop for Disruptor<T>
where
    T: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.state == LifecycleState::Running {
            self.halt();
        }
    }
}

impl<T> std::fmt::Debug for Disruptor<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disruptor")
            .field("ring_buffer", &self.ring_buffer)
            .field("consumers", &self.consumers.len())
            .field("state", &self.state)
            .finish()
    }
}
