//! Switchyard Service — lazily-instantiated providers, priority-ordered
//! dispatch, and per-operation result caching.

pub mod error;
pub mod notify;
pub mod service;
pub mod telemetry;
pub mod traits;

pub use error::{ConfigError, ConfigurationError, DispatchError};
pub use notify::{ChangeNotifier, ProviderChangeEvent, ProviderChangeListener};
pub use service::{
    ProviderCatalog, ProviderDescriptor, ProviderEntry, ProviderService, ProviderServiceBuilder,
    ServiceConfig, ServiceSettings,
};
pub use switchyard_core::{
    Capability, ExecutionStrategy, FailurePolicy, Operation, ProviderPriority,
};
pub use traits::{factory, Policy, Provider, ProviderFactory};
