//! Event Factory
//!
//! Factories pre-populate every slot of the ring buffer once, at construction.
//! After that, events are reused in place and never allocated per publish.

/// Creates the pre-allocated event stored in each ring buffer slot
///
/// # Examples
/// ```
/// use ringway::disruptor::EventFactory;
///
/// struct Trade {
///     price: i64,
/// }
///
/// struct TradeFactory;
///
/// impl EventFactory<Trade> for TradeFactory {
///     fn new_instance(&self) -> Trade {
///         Trade { price: 0 }
///     }
/// }
/// ```
pub trait EventFactory<T>: Send + Sync {
    /// Called once per slot while the ring buffer is being built
    fn new_instance(&self) -> T;
}

/// Event factory for types implementing `Default`
pub struct DefaultEventFactory<T: Default> {
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T: Default> DefaultEventFactory<T> {
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: Default> Default for DefaultEventFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> EventFactory<T> for DefaultEventFactory<T> {
    fn new_instance(&self) -> T {
        T::default()
    }
}

/// Event factory backed by a closure
///
/// # Type Parameters
/// * `T` - The event type
/// * `F` - The closure type
pub struct ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    factory_fn: F,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    /// Create a new closure-based event factory
    ///
    /// # Arguments
    /// * `factory_fn` - The closure that creates new event instances
    pub fn new(factory_fn: F) -> Self {
        Self {
            factory_fn,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventFactory<T> for ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    fn new_instance(&self) -> T {
        (self.factory_fn)()
    }
}
