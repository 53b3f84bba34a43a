//! Switchyard Core — provider priorities, execution strategies, operations, and
//! declarative capability predicates.

pub mod operation;
pub mod priority;
pub mod strategy;

pub use operation::{Capability, Operation};
pub use priority::{ParsePriorityError, ProviderPriority};
pub use strategy::{ExecutionStrategy, FailurePolicy, ParseStrategyError};
