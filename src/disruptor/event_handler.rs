//! Event Handler Implementation
//!
//! This module provides the EventHandler trait implemented by consumers, and
//! small adapters for closures and benchmarking.

use crate::disruptor::Result;

/// Callback interface for consuming events from the ring buffer
///
/// Each registered handler is driven by exactly one batch event processor,
/// on exactly one thread, so the handler may keep mutable state without
/// synchronization. Events are shared with every other handler of the same
/// stage and are therefore handed out read-only.
///
/// A stage that enriches the event for stages gated on it writes through a
/// field with interior mutability. The downstream barrier only releases the
/// event after the upstream sequence has moved past it, so the later stage
/// sees the write:
///
/// ```
/// use ringway::disruptor::{EventHandler, Result};
/// use std::sync::atomic::{AtomicI64, Ordering};
///
/// #[derive(Default)]
/// struct Order {
///     quantity: i64,
///     notional: AtomicI64,
/// }
///
/// struct Pricer {
///     price: i64,
/// }
///
/// impl EventHandler<Order> for Pricer {
///     fn on_event(&mut self, order: &Order, _sequence: i64, _end_of_batch: bool) -> Result<()> {
///         order.notional.store(order.quantity * self.price, Ordering::Release);
///         Ok(())
///     }
/// }
///
/// // Registered with `.then(..)` after the pricer
/// struct Ledger {
///     total: i64,
/// }
///
/// impl EventHandler<Order> for Ledger {
///     fn on_event(&mut self, order: &Order, _sequence: i64, _end_of_batch: bool) -> Result<()> {
///         self.total += order.notional.load(Ordering::Acquire);
///         Ok(())
///     }
/// }
///
/// let order = Order { quantity: 3, ..Order::default() };
/// let mut ledger = Ledger { total: 0 };
/// Pricer { price: 7 }.on_event(&order, 0, true).unwrap();
/// ledger.on_event(&order, 0, true).unwrap();
/// assert_eq!(ledger.total, 21);
/// ```
///
/// Fields that need more than a word can sit behind a `parking_lot::Mutex`.
///
/// # Type Parameters
/// * `T` - The event type that will be processed
///
/// # Examples
/// ```
/// use ringway::disruptor::{EventHandler, Result};
///
/// struct PriceEvent {
///     price: i64,
/// }
///
/// #[derive(Default)]
/// struct Summer {
///     total: i64,
/// }
///
/// impl EventHandler<PriceEvent> for Summer {
///     fn on_event(&mut self, event: &PriceEvent, _sequence: i64, _end_of_batch: bool) -> Result<()> {
///         self.total += event.price;
///         Ok(())
///     }
/// }
/// ```
pub trait EventHandler<T>: Send {
    /// Process an event
    ///
    /// # Arguments
    /// * `event` - The published event
    /// * `sequence` - The sequence number of the event in the ring buffer
    /// * `end_of_batch` - True if this is the last event of the batch the
    ///   processor obtained from its barrier, which makes it a natural point
    ///   to flush buffered work
    ///
    /// # Errors
    /// Any error is routed to the processor's exception handler
    fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool) -> Result<()>;

    /// Called once on the processor thread before the first event
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once on the processor thread after it stops
    fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called when a processor with a bounded wait saw no event in time
    ///
    /// # Arguments
    /// * `sequence` - The last sequence the processor has completed
    fn on_timeout(&mut self, _sequence: i64) -> Result<()> {
        Ok(())
    }
}

impl<T, H> EventHandler<T> for Box<H>
where
    H: EventHandler<T> + ?Sized,
{
    fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool) -> Result<()> {
        (**self).on_event(event, sequence, end_of_batch)
    }

    fn on_start(&mut self) -> Result<()> {
        (**self).on_start()
    }

    fn on_shutdown(&mut self) -> Result<()> {
        (**self).on_shutdown()
    }

    fn on_timeout(&mut self, sequence: i64) -> Result<()> {
        (**self).on_timeout(sequence)
    }
}

/// An event handler backed by a closure
///
/// # Type Parameters
/// * `T` - The event type
/// * `F` - The closure type
pub struct ClosureEventHandler<T, F>
where
    F: FnMut(&T, i64, bool) -> Result<()> + Send,
{
    handler: F,
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> ClosureEventHandler<T, F>
where
    F: FnMut(&T, i64, bool) -> Result<()> + Send,
{
    /// Create a new closure-based event handler
    ///
    /// # Arguments
    /// * `handler` - Called with `(event, sequence, end_of_batch)`
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventHandler<T> for ClosureEventHandler<T, F>
where
    F: FnMut(&T, i64, bool) -> Result<()> + Send,
{
    fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool) -> Result<()> {
        (self.handler)(event, sequence, end_of_batch)
    }
}

/// A handler that does nothing, for measuring framework overhead
pub struct NoOpEventHandler<T> {
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T> NoOpEventHandler<T> {
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> Default for NoOpEventHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventHandler<T> for NoOpEventHandler<T> {
    fn on_event(&mut self, _event: &T, _sequence: i64, _end_of_batch: bool) -> Result<()> {
        Ok(())
    }
}
