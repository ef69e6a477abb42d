//! Exception Handler Implementation
//!
//! Exception handlers decide what a batch event processor does when its event
//! handler fails: halt (the default) or log and carry on with the next event.

use crate::disruptor::{DisruptorError, Result};
use tracing::{error, warn};

/// Policy applied when an event handler fails
///
/// # Type Parameters
/// * `T` - The event type being processed
pub trait ExceptionHandler<T>: Send + Sync {
    /// Handle a fault raised by `on_event`
    ///
    /// # Arguments
    /// * `error` - The error the handler returned, passed on by move
    /// * `sequence` - The sequence number of the failed event
    /// * `event` - The event that was being processed
    ///
    /// # Returns
    /// `Ok(())` to skip the failed event and keep processing, in which case
    /// the processor's sequence still advances past it. `Err` halts the
    /// processor and is returned from its run loop.
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, event: &T)
        -> Result<()>;

    /// Handle a fault raised by `on_start`; processing starts regardless
    fn handle_on_start_exception(&self, error: DisruptorError) {
        error!(%error, "event handler failed to start");
    }

    /// Handle a fault raised by `on_shutdown`
    fn handle_on_shutdown_exception(&self, error: DisruptorError) {
        error!(%error, "event handler failed to shut down");
    }
}

/// Halts the processor on the first fault
///
/// Used whenever no other policy has been configured.
pub struct FatalExceptionHandler<T> {
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T> FatalExceptionHandler<T> {
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> Default for FatalExceptionHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ExceptionHandler<T> for FatalExceptionHandler<T> {
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, _event: &T) -> Result<()> {
        error!(sequence, %error, "fatal exception processing event");
        Err(error)
    }
}

/// Logs the fault and moves on to the next event
pub struct IgnoreExceptionHandler<T> {
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T> IgnoreExceptionHandler<T> {
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> Default for IgnoreExceptionHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ExceptionHandler<T> for IgnoreExceptionHandler<T> {
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, _event: &T) -> Result<()> {
        warn!(sequence, %error, "ignoring exception processing event");
        Ok(())
    }

    fn handle_on_start_exception(&self, error: DisruptorError) {
        warn!(%error, "ignoring exception on start");
    }

    fn handle_on_shutdown_exception(&self, error: DisruptorError) {
        warn!(%error, "ignoring exception on shutdown");
    }
}

/// Exception handler backed by a closure
///
/// # Type Parameters
/// * `T` - The event type
/// * `F` - Called with `(error, sequence, event)`
pub struct ClosureExceptionHandler<T, F>
where
    F: Fn(DisruptorError, i64, &T) -> Result<()> + Send + Sync,
{
    handler: F,
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> ClosureExceptionHandler<T, F>
where
    F: Fn(DisruptorError, i64, &T) -> Result<()> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> ExceptionHandler<T> for ClosureExceptionHandler<T, F>
where
    F: Fn(DisruptorError, i64, &T) -> Result<()> + Send + Sync,
{
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, event: &T) -> Result<()> {
        (self.handler)(error, sequence, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[derive(Debug, Default)]
    struct TestEvent {
        value: i64,
    }

    fn handler_error(message: &str) -> DisruptorError {
        DisruptorError::Handler(anyhow::anyhow!(message.to_string()))
    }

    #[test]
    fn test_fatal_exception_handler_returns_the_error() {
        let handler = FatalExceptionHandler::<TestEvent>::new();
        let result = handler.handle_event_exception(handler_error("boom"), 7, &TestEvent::default());

        let error = result.unwrap_err();
        assert!(matches!(error, DisruptorError::Handler(_)));
        assert!(error.to_string().contains("boom"));

        handler.handle_on_start_exception(handler_error("start"));
        handler.handle_on_shutdown_exception(handler_error("stop"));
    }

    #[test]
    fn test_ignore_exception_handler_continues() {
        let handler = IgnoreExceptionHandler::<TestEvent>::new();
        assert!(handler
            .handle_event_exception(handler_error("boom"), 7, &TestEvent::default())
            .is_ok());
    }

    #[test]
    fn test_closure_exception_handler_sees_sequence_and_event() {
        let last = AtomicI64::new(-1);
        let handler = ClosureExceptionHandler::new(|_error, sequence, event: &TestEvent| {
            last.store(sequence * 100 + event.value, Ordering::SeqCst);
            Ok(())
        });

        handler
            .handle_event_exception(handler_error("boom"), 3, &TestEvent { value: 4 })
            .unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 304);
    }
}
