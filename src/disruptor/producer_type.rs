//! Producer Type
//!
//! Selects the claim strategy a ring buffer is built with. The choice is fixed
//! for the lifetime of the buffer.

use crate::disruptor::{
    ClaimStrategy, DisruptorError, MultiThreadedClaimStrategy, SingleThreadedClaimStrategy,
};
use serde::{Deserialize, Serialize};

/// How many threads may publish into a ring buffer
///
/// # Examples
/// ```
/// use ringway::disruptor::ProducerType;
///
/// assert!(ProducerType::Single.is_single());
/// assert!(ProducerType::Multi.is_multi());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerType {
    /// Exactly one publishing thread. Claims are unsynchronized; publishing
    /// from a second thread is undefined behaviour of the sequence protocol.
    Single,

    /// Any number of publishing threads.
    #[default]
    Multi,
}

impl ProducerType {
    pub fn is_single(&self) -> bool {
        matches!(self, ProducerType::Single)
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, ProducerType::Multi)
    }

    /// Build the claim strategy matching this producer type
    pub(crate) fn claim_strategy(&self, buffer_size: usize) -> Box<dyn ClaimStrategy> {
        match self {
            ProducerType::Single => Box::new(SingleThreadedClaimStrategy::new(buffer_size)),
            ProducerType::Multi => Box::new(MultiThreadedClaimStrategy::new(buffer_size)),
        }
    }
}

impl std::fmt::Display for ProducerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerType::Single => write!(f, "single"),
            ProducerType::Multi => write!(f, "multi"),
        }
    }
}

impl std::str::FromStr for ProducerType {
    type Err = DisruptorError;

    /// Case-insensitive `single` or `multi`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ProducerType::Single),
            "multi" => Ok(ProducerType::Multi),
            _ => Err(DisruptorError::Config(format!(
                "invalid producer type '{s}', expected 'single' or 'multi'"
            ))),
        }
    }
}
