//! `Ringway` - Disruptor-style inter-thread messaging
//!
//! A bounded, pre-allocated ring buffer shared by producers and a graph of
//! consumers, coordinated only through sequence counters. Producers claim a
//! slot, fill it in place and publish it; every consumer stage runs on its own
//! thread, processes events in batches and advances its own sequence, which is
//! what downstream stages and the producer wait on.
//!
//! ## Quick Start
//!
//! ```rust
//! use ringway::disruptor::{
//!     DefaultEventFactory, Disruptor, EventHandler, Result,
//! };
//! use std::time::Duration;
//!
//! #[derive(Debug, Default)]
//! struct PriceTick {
//!     price: i64,
//! }
//!
//! struct Journal {
//!     total: i64,
//! }
//!
//! impl EventHandler<PriceTick> for Journal {
//!     fn on_event(&mut self, event: &PriceTick, _sequence: i64, _end_of_batch: bool) -> Result<()> {
//!         self.total += event.price;
//!         Ok(())
//!     }
//! }
//!
//! let mut disruptor = Disruptor::with_defaults(DefaultEventFactory::<PriceTick>::new(), 1024).unwrap();
//! disruptor.handle_events_with(Journal { total: 0 }).unwrap();
//!
//! let ring_buffer = disruptor.start().unwrap();
//! for price in 0..10 {
//!     ring_buffer.publish_with(|tick, _sequence| tick.price = price).unwrap();
//! }
//!
//! disruptor.shutdown(Duration::from_secs(1)).unwrap();
//! ```
//!
//! ## Architecture
//!
//! - **`RingBuffer`**: pre-allocated slots plus the producer cursor
//! - **`Sequence`**: cache-padded progress counter
//! - **`ClaimStrategy`**: single or multi producer slot reservation
//! - **`WaitStrategy`**: how consumers and blocked producers wait
//! - **`SequenceBarrier`**: the safe-to-read frontier for one consumer
//! - **`BatchEventProcessor`**: drives one `EventHandler`
//! - **`Disruptor`**: wires handlers into a dependency graph and runs them
//!   on an `Executor`

pub mod disruptor;

pub use disruptor::{
    is_power_of_two, BatchEventProcessor, BlockingWaitStrategy, BusySpinWaitStrategy,
    DefaultEventFactory, Disruptor, DisruptorConfig, DisruptorError, EventFactory, EventHandler,
    EventHandlerGroup, EventProcessor, EventTranslator, EventTranslatorOneArg,
    EventTranslatorTwoArg, ExceptionHandler, Executor, HandlerId, ProducerType, Result,
    RingBuffer, Sequence, SequenceBarrier, SleepingWaitStrategy, ThreadedExecutor, WaitStrategy,
    YieldingWaitStrategy, INITIAL_CURSOR_VALUE,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `Ringway` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
