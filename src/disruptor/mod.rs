//! Ringway Disruptor core
//!
//! The concurrent data-structure and coordination layer: sequences, the ring
//! buffer, claim and wait strategies, sequence barriers, the batch event
//! processor and the dependency-graph builder that wires them together.

pub mod claim_strategy;
pub mod config;
pub mod consumer_repository;
pub mod disruptor;
pub mod event_factory;
pub mod event_handler;
pub mod event_handler_group;
pub mod event_processor;
pub mod event_translator;
pub mod exception_handler;
pub mod executor;
pub mod producer_type;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_barrier;
pub mod thread_management;
pub mod wait_strategy;


pub use claim_strategy::{
    CapacityGate, ClaimStrategy, MultiThreadedClaimStrategy, SingleThreadedClaimStrategy,
};
pub use config::{DisruptorConfig, WaitStrategyConfig};
pub use consumer_repository::{ConsumerRepository, HandlerId};
pub use disruptor::{Disruptor, LifecycleState};
pub use event_factory::{ClosureEventFactory, DefaultEventFactory, EventFactory};
pub use event_handler::{ClosureEventHandler, EventHandler, NoOpEventHandler};
pub use event_handler_group::EventHandlerGroup;
pub use event_processor::{BatchEventProcessor, EventProcessor, ProcessorControl, ProcessorState};
pub use event_translator::{EventTranslator, EventTranslatorOneArg, EventTranslatorTwoArg};
pub use exception_handler::{
    ClosureExceptionHandler, ExceptionHandler, FatalExceptionHandler, IgnoreExceptionHandler,
};
pub use executor::{Executor, Task, ThreadedExecutor, TokioExecutor};
pub use producer_type::ProducerType;
pub use ring_buffer::{BatchIterMut, RingBuffer};
pub use sequence::{get_minimum_sequence, Sequence, SequenceGroup};
pub use sequence_barrier::{AlertFlag, ProcessingSequenceBarrier, SequenceBarrier};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, WaitStrategy,
    YieldingWaitStrategy,
};

/// The initial cursor value for sequences
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Errors that can occur in the Disruptor
#[derive(Debug, thiserror::Error)]
pub enum DisruptorError {
    #[error("Buffer size must be a power of 2, got: {0}")]
    InvalidBufferSize(usize),

    #[error("Insufficient capacity in the ring buffer")]
    InsufficientCapacity,

    #[error("Cannot claim {0} slots at once")]
    InvalidClaim(usize),

    #[error("Sequence barrier was alerted")]
    Alert,

    #[error("Timeout waiting for sequence")]
    Timeout,

    #[error("Event handler {0} is not registered with this disruptor")]
    HandlerNotRegistered(HandlerId),

    #[error("Disruptor has already been started")]
    AlreadyStarted,

    #[error("Disruptor has been shut down")]
    Shutdown,

    #[error("Event processor is already running")]
    ProcessorAlreadyRunning,

    #[error("Event handler failed: {0}")]
    Handler(#[from] anyhow::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl DisruptorError {
    /// Wrap an arbitrary error raised by user code as a handler fault
    pub fn handler<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(anyhow::Error::new(error))
    }

    /// True for the cooperative cancellation signal, which is never a fault
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Alert)
    }
}

pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Utility function to check if a number is a power of 2
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}
