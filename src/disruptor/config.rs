//! Disruptor configuration
//!
//! Serializable settings for building a Disruptor from a JSON file or string.
//! Every field has a default, so a config only needs to name what it changes.

use crate::disruptor::thread_management::validate_core_id;
use crate::disruptor::{
    is_power_of_two, BlockingWaitStrategy, BusySpinWaitStrategy, DisruptorError, ProducerType,
    Result, SleepingWaitStrategy, ThreadedExecutor, WaitStrategy, YieldingWaitStrategy,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn default_spin_tries() -> u32 {
    100
}

fn default_sleep_micros() -> u64 {
    100
}

/// Which wait strategy processors and blocked producers use
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaitStrategyConfig {
    BusySpin,
    Yielding {
        #[serde(default = "default_spin_tries")]
        spin_tries: u32,
    },
    #[default]
    Blocking,
    Sleeping {
        #[serde(default = "default_sleep_micros")]
        sleep_micros: u64,
    },
}

impl WaitStrategyConfig {
    pub fn build(&self) -> Arc<dyn WaitStrategy> {
        match self {
            WaitStrategyConfig::BusySpin => Arc::new(BusySpinWaitStrategy::new()),
            WaitStrategyConfig::Yielding { spin_tries } => {
                Arc::new(YieldingWaitStrategy::with_spin_tries(*spin_tries))
            }
            WaitStrategyConfig::Blocking => Arc::new(BlockingWaitStrategy::new()),
            WaitStrategyConfig::Sleeping { sleep_micros } => Arc::new(
                SleepingWaitStrategy::new_with_duration(Duration::from_micros(*sleep_micros)),
            ),
        }
    }
}

/// Settings for a Disruptor instance
///
/// # Examples
/// ```
/// use ringway::disruptor::{DisruptorConfig, ProducerType};
///
/// let config = DisruptorConfig::from_json_str(
///     r#"{ "buffer_size": 256, "producer_type": "single", "wait_strategy": { "type": "yielding" } }"#,
/// ).unwrap();
///
/// assert_eq!(config.buffer_size, 256);
/// assert_eq!(config.producer_type, ProducerType::Single);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisruptorConfig {
    /// Number of ring buffer slots, a power of two
    pub buffer_size: usize,
    pub producer_type: ProducerType,
    pub wait_strategy: WaitStrategyConfig,
    /// Processor threads are named `<prefix>-<n>`
    pub thread_name_prefix: String,
    /// Cores to pin processor threads to, round-robin; empty means unpinned
    pub cpu_affinity: Vec<usize>,
    /// Bounded processor wait; `on_timeout` fires when it expires
    pub processor_timeout_ms: Option<u64>,
}

impl Default for DisruptorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            producer_type: ProducerType::default(),
            wait_strategy: WaitStrategyConfig::default(),
            thread_name_prefix: "ringway-processor".to_string(),
            cpu_affinity: Vec::new(),
            processor_timeout_ms: None,
        }
    }
}

impl DisruptorConfig {
    /// Parse and validate a JSON config
    ///
    /// # Errors
    /// `DisruptorError::Json` for malformed input, or any `validate` error
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the settings against this machine
    ///
    /// # Errors
    /// `InvalidBufferSize` for a size that is not a power of two, `Config`
    /// for an empty thread name prefix, an unknown core or a zero timeout
    pub fn validate(&self) -> Result<()> {
        if !is_power_of_two(self.buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(self.buffer_size));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(DisruptorError::Config(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        if self.processor_timeout_ms == Some(0) {
            return Err(DisruptorError::Config(
                "processor_timeout_ms must be greater than zero".to_string(),
            ));
        }
        for &core in &self.cpu_affinity {
            validate_core_id(core)?;
        }
        Ok(())
    }

    pub fn build_wait_strategy(&self) -> Arc<dyn WaitStrategy> {
        self.wait_strategy.build()
    }

    /// Thread-per-processor executor honouring the naming and pinning settings
    pub fn build_executor(&self) -> Result<ThreadedExecutor> {
        ThreadedExecutor::with_name_prefix(self.thread_name_prefix.clone())
            .with_cpu_affinity(self.cpu_affinity.clone())
    }

    pub fn processor_timeout(&self) -> Option<Duration> {
        self.processor_timeout_ms.map(Duration::from_millis)
    }
}
