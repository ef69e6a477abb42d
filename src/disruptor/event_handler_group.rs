//! Fluent handler groups
//!
//! A thin layer over [`Disruptor::add_stage`]: a group remembers a set of
//! registered handlers so the next stage can be declared to wait on them.

use crate::disruptor::{
    Disruptor, EventHandler, HandlerId, ProcessingSequenceBarrier, Result,
};

/// A set of registered handlers used as the dependency of the next stage
///
/// # Examples
/// ```
/// use ringway::disruptor::{DefaultEventFactory, Disruptor, NoOpEventHandler};
///
/// let mut disruptor = Disruptor::with_defaults(DefaultEventFactory::<u64>::new(), 16).unwrap();
/// let journal = disruptor
///     .handle_events_with(NoOpEventHandler::new())
///     .unwrap()
///     .handler_ids()
///     .to_vec();
/// let replicate = disruptor
///     .handle_events_with(NoOpEventHandler::new())
///     .unwrap()
///     .handler_ids()
///     .to_vec();
///
/// // Business logic waits for both journalling and replication
/// disruptor
///     .after(&journal)
///     .unwrap()
///     .and(&replicate)
///     .unwrap()
///     .handle_events_with(NoOpEventHandler::new())
///     .unwrap();
/// ```
pub struct EventHandlerGroup<'a, T>
where
    T: Send + Sync + 'static,
{
    disruptor: &'a mut Disruptor<T>,
    handler_ids: Vec<HandlerId>,
}

impl<'a, T> EventHandlerGroup<'a, T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(disruptor: &'a mut Disruptor<T>, handler_ids: Vec<HandlerId>) -> Self {
        Self {
            disruptor,
            handler_ids,
        }
    }

    /// Register a handler that waits for every handler in this group
    ///
    /// # Returns
    /// A group holding only the new handler
    pub fn then<H>(self, handler: H) -> Result<Self>
    where
        H: EventHandler<T> + 'static,
    {
        self.handle_events_with(handler)
    }

    /// Register parallel handlers that each wait for this group
    pub fn then_all(self, handlers: Vec<Box<dyn EventHandler<T>>>) -> Result<Self> {
        self.handle_events_with_all(handlers)
    }

    pub fn handle_events_with<H>(self, handler: H) -> Result<Self>
    where
        H: EventHandler<T> + 'static,
    {
        self.handle_events_with_all(vec![Box::new(handler)])
    }

    pub fn handle_events_with_all(self, handlers: Vec<Box<dyn EventHandler<T>>>) -> Result<Self> {
        let handler_ids = self.disruptor.add_stage(&self.handler_ids, handlers)?;
        Ok(Self::new(self.disruptor, handler_ids))
    }

    /// Union this group with other registered handlers
    ///
    /// # Errors
    /// `HandlerNotRegistered` if any id is unknown to the Disruptor
    pub fn and(mut self, handler_ids: &[HandlerId]) -> Result<Self> {
        self.disruptor.sequences_for(handler_ids)?;
        for id in handler_ids {
            if !self.handler_ids.contains(id) {
                self.handler_ids.push(*id);
            }
        }
        Ok(self)
    }

    pub fn handler_ids(&self) -> &[HandlerId] {
        &self.handler_ids
    }

    /// A barrier gated on every handler in the group, for custom processors
    pub fn as_sequence_barrier(&self) -> Result<ProcessingSequenceBarrier> {
        let sequences = self.disruptor.sequences_for(&self.handler_ids)?;
        Ok(self.disruptor.get_ring_buffer().new_barrier(sequences))
    }
}

impl<T> std::fmt::Debug for EventHandlerGroup<'_, T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlerGroup")
            .field("handler_ids", &self.handler_ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{DefaultEventFactory, DisruptorError, NoOpEventHandler, SequenceBarrier};

    fn disruptor() -> Disruptor<i64> {
        Disruptor::with_defaults(DefaultEventFactory::<i64>::new(), 8).unwrap()
    }

    #[test]
    fn test_then_chains_single_handlers() {
        let mut disruptor = disruptor();
        let first = disruptor
            .handle_events_with(NoOpEventHandler::new())
            .unwrap()
            .handler_ids()
            .to_vec();

        let last = disruptor
            .after(&first)
            .unwrap()
            .then(NoOpEventHandler::new())
            .unwrap()
            .then(NoOpEventHandler::new())
            .unwrap()
            .handler_ids()
            .to_vec();

        assert_eq!(disruptor.handler_ids().len(), 3);
        assert_eq!(last.len(), 1);
        assert_eq!(disruptor.handler_ids()[2], last[0]);
    }

    #[test]
    fn test_and_unions_without_duplicates() {
        let mut disruptor = disruptor();
        let ids = disruptor
            .handle_events_with_all(vec![
                Box::new(NoOpEventHandler::<i64>::new()),
                Box::new(NoOpEventHandler::<i64>::new()),
            ])
            .unwrap()
            .handler_ids()
            .to_vec();

        let group = disruptor.after(&ids[..1]).unwrap().and(&ids).unwrap();
        assert_eq!(group.handler_ids(), &ids[..]);
    }

    #[test]
    fn test_and_rejects_foreign_handler() {
        let mut disruptor = disruptor();
        let mut other = self::disruptor();
        let foreign = other
            .handle_events_with(NoOpEventHandler::new())
            .unwrap()
            .handler_ids()
            .to_vec();
        let ids = disruptor
            .handle_events_with(NoOpEventHandler::new())
            .unwrap()
            .handler_ids()
            .to_vec();

        let result = disruptor.after(&ids).unwrap().and(&foreign);
        assert!(matches!(result, Err(DisruptorError::HandlerNotRegistered(_))));
    }

    #[test]
    fn test_as_sequence_barrier_tracks_group() {
        let mut disruptor = disruptor();
        let group = disruptor.handle_events_with(NoOpEventHandler::new()).unwrap();
        let barrier = group.as_sequence_barrier().unwrap();

        assert_eq!(barrier.dependent_sequences().len(), 1);
        assert!(!barrier.is_alerted());
    }
}
