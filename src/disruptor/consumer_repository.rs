//! Consumer Repository
//!
//! The explicit dependency graph behind the Disruptor builder. Every
//! registered event handler gets an opaque [`HandlerId`]; processors,
//! sequences and barriers are looked up by that identity only, so two handlers
//! that happen to compare equal can never be confused.

use crate::disruptor::{
    BatchEventProcessor, DisruptorError, EventProcessor, ExceptionHandler, ProcessorControl,
    Result, Sequence, SequenceBarrier,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Identity token minted for each handler registration
///
/// Ids only come from registering a handler. They cannot be built from a
/// UUID or deserialized:
///
/// ```compile_fail
/// use ringway::disruptor::HandlerId;
///
/// let forged: HandlerId =
///     serde_json::from_str("\"67e55044-10b1-426f-9247-bb680e5fe0c8\"").unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct ConsumerInfo<T> {
    id: HandlerId,
    sequence: Arc<Sequence>,
    barrier: Arc<dyn SequenceBarrier>,
    /// Taken when the disruptor starts
    processor: Option<BatchEventProcessor<T>>,
    control: ProcessorControl,
    exception_handler: Option<Arc<dyn ExceptionHandler<T>>>,
    /// No other consumer depends on this one
    end_of_chain: bool,
}

/// A processor ready to be scheduled, with its resolved exception override
pub(crate) struct PendingProcessor<T> {
    pub id: HandlerId,
    pub processor: BatchEventProcessor<T>,
    pub exception_handler: Option<Arc<dyn ExceptionHandler<T>>>,
}

/// Registry of every consumer in a Disruptor, in registration order
pub struct ConsumerRepository<T> {
    consumers: Vec<ConsumerInfo<T>>,
    by_id: HashMap<HandlerId, usize>,
}

impl<T> ConsumerRepository<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            consumers: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Register a processor and mint its identity
    pub fn add(
        &mut self,
        processor: BatchEventProcessor<T>,
        barrier: Arc<dyn SequenceBarrier>,
    ) -> HandlerId {
        let id = HandlerId::new();
        let info = ConsumerInfo {
            id,
            sequence: processor.get_sequence(),
            barrier,
            control: processor.control(),
            processor: Some(processor),
            exception_handler: None,
            end_of_chain: true,
        };
        self.by_id.insert(id, self.consumers.len());
        self.consumers.push(info);
        id
    }

    fn info(&self, id: &HandlerId) -> Result<&ConsumerInfo<T>> {
        self.by_id
            .get(id)
            .map(|&index| &self.consumers[index])
            .ok_or(DisruptorError::HandlerNotRegistered(*id))
    }

    fn info_mut(&mut self, id: &HandlerId) -> Result<&mut ConsumerInfo<T>> {
        match self.by_id.get(id) {
            Some(&index) => Ok(&mut self.consumers[index]),
            None => Err(DisruptorError::HandlerNotRegistered(*id)),
        }
    }

    pub fn contains(&self, id: &HandlerId) -> bool {
        self.by_id.contains_key(id)
    }

    /// # Errors
    /// `DisruptorError::HandlerNotRegistered` for an id minted elsewhere
    pub fn sequence_for(&self, id: &HandlerId) -> Result<Arc<Sequence>> {
        self.info(id).map(|info| Arc::clone(&info.sequence))
    }

    pub fn barrier_for(&self, id: &HandlerId) -> Result<Arc<dyn SequenceBarrier>> {
        self.info(id).map(|info| Arc::clone(&info.barrier))
    }

    pub fn control_for(&self, id: &HandlerId) -> Result<ProcessorControl> {
        self.info(id).map(|info| info.control.clone())
    }

    /// Record that some consumer now depends on `id`
    pub fn unmark_end_of_chain(&mut self, id: &HandlerId) -> Result<()> {
        self.info_mut(id)?.end_of_chain = false;
        Ok(())
    }

    pub fn is_end_of_chain(&self, id: &HandlerId) -> Result<bool> {
        self.info(id).map(|info| info.end_of_chain)
    }

    /// Sequences of consumers nothing else depends on
    pub fn end_of_chain_sequences(&self) -> Vec<Arc<Sequence>> {
        self.consumers
            .iter()
            .filter(|info| info.end_of_chain)
            .map(|info| Arc::clone(&info.sequence))
            .collect()
    }

    /// Override the exception policy of a single consumer
    pub fn set_exception_handler(
        &mut self,
        id: &HandlerId,
        exception_handler: Arc<dyn ExceptionHandler<T>>,
    ) -> Result<()> {
        self.info_mut(id)?.exception_handler = Some(exception_handler);
        Ok(())
    }

    /// Hand over every processor not yet scheduled, in registration order
    pub(crate) fn take_processors(&mut self) -> Vec<PendingProcessor<T>> {
        self.consumers
            .iter_mut()
            .filter_map(|info| {
                info.processor.take().map(|processor| PendingProcessor {
                    id: info.id,
                    processor,
                    exception_handler: info.exception_handler.clone(),
                })
            })
            .collect()
    }

    pub fn halt_all(&self) {
        for info in &self.consumers {
            info.control.halt();
        }
    }

    pub fn handler_ids(&self) -> Vec<HandlerId> {
        self.consumers.iter().map(|info| info.id).collect()
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

impl<T> Default for ConsumerRepository<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
