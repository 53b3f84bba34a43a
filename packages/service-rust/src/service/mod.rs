//! Provider dispatch service.
//!
//! This module implements the provider dispatch pipeline:
//!
//! 1. **Catalog** (`catalog`): provider id -> factory closure
//! 2. **Configuration** (`config`): declarative entries resolved against the catalog
//! 3. **Descriptors** (`descriptor`): lazy provider instantiation and cheap `provides` checks
//! 4. **Registry** (`registry`): priority ordering, execution strategies, result caching

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod registry;

// Re-export key types for convenient access.
pub use catalog::ProviderCatalog;
pub use config::{ProviderEntry, ServiceConfig, ServiceSettings};
pub use descriptor::ProviderDescriptor;
pub use registry::{ProviderService, ProviderServiceBuilder};
