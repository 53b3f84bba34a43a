//! Dispatch policies selected per `execute` call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a service walks its priority-sorted descriptors for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStrategy {
    /// Execute only the first (highest priority) provider that provides.
    First,
    /// Execute every provider that provides, highest priority first.
    ForwardAll,
    /// Execute every provider that provides, lowest priority first.
    ReverseAll,
}

/// What a multi-provider dispatch does when one provider fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailurePolicy {
    /// Surface the first error and discard any partial results.
    #[default]
    Abort,
    /// Log the error and continue with the next provider.
    SkipAndContinue,
}

/// Error returned when a string names no execution strategy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown execution strategy: {input:?}")]
pub struct ParseStrategyError {
    pub input: String,
}

impl ExecutionStrategy {
    pub const ALL: [ExecutionStrategy; 3] = [
        ExecutionStrategy::First,
        ExecutionStrategy::ForwardAll,
        ExecutionStrategy::ReverseAll,
    ];

    /// Visiting order over a list already sorted by descending priority.
    pub fn ordered<T>(self, sorted: &[T]) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            ExecutionStrategy::First | ExecutionStrategy::ForwardAll => Box::new(sorted.iter()),
            ExecutionStrategy::ReverseAll => Box::new(sorted.iter().rev()),
        }
    }

    /// Whether dispatch ends after the first successful result.
    #[must_use]
    pub const fn stops_at_first_result(self) -> bool {
        matches!(self, ExecutionStrategy::First)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ExecutionStrategy::First => "FIRST",
            ExecutionStrategy::ForwardAll => "FORWARD_ALL",
            ExecutionStrategy::ReverseAll => "REVERSE_ALL",
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| ParseStrategyError {
                input: s.to_string(),
            })
    }
}
