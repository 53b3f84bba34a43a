//! Service settings and declarative provider configuration.
//!
//! A [`ServiceConfig`] lists provider entries by catalog id together with
//! their priority and optional capability metadata. Resolving it against a
//! [`ProviderCatalog`] yields descriptors; entries whose id is unknown become
//! [`ConfigurationError`]s instead of failing the whole configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use switchyard_core::{Capability, FailurePolicy, Operation, ProviderPriority};
use tracing::{debug, warn};

use super::catalog::ProviderCatalog;
use super::descriptor::ProviderDescriptor;
use crate::error::{ConfigError, ConfigurationError};

/// Runtime behavior of a `ProviderService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// What multi-provider dispatch does when one provider fails.
    pub failure_policy: FailurePolicy,
    /// Memoize results of operations that carry a caching key.
    pub caching: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Abort,
            caching: true,
        }
    }
}

/// One configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Display name. Defaults to the catalog id.
    #[serde(default)]
    pub name: Option<String>,
    /// Catalog id of the provider factory.
    pub provider: String,
    #[serde(default)]
    pub priority: ProviderPriority,
    /// Static capability used to reject operations before instantiation.
    #[serde(default)]
    pub capability: Option<Capability>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ProviderEntry {
    #[must_use]
    pub fn new(provider: impl Into<String>, priority: ProviderPriority) -> Self {
        Self {
            name: None,
            provider: provider.into(),
            priority,
            capability: None,
            enabled: true,
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.provider)
    }
}

/// Declarative configuration of a whole service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub settings: ServiceSettings,
    /// Entries in registration order.
    pub providers: Vec<ProviderEntry>,
}

impl ServiceConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is malformed.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is malformed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Turns enabled entries into descriptors, in registration order.
    ///
    /// Entries naming an id missing from `catalog` are returned as errors and
    /// left out; disabled entries are skipped.
    pub fn resolve<O, R>(
        &self,
        catalog: &ProviderCatalog<O, R>,
    ) -> (Vec<ProviderDescriptor<O, R>>, Vec<ConfigurationError>)
    where
        O: Operation + 'static,
        R: 'static,
    {
        let mut descriptors = Vec::with_capacity(self.providers.len());
        let mut errors = Vec::new();

        for entry in &self.providers {
            let name = entry.display_name();
            if !entry.enabled {
                debug!(provider = name, "provider entry disabled");
                continue;
            }
            let Some(factory) = catalog.get(&entry.provider) else {
                warn!(
                    provider = name,
                    id = %entry.provider,
                    "provider id not found in catalog; entry excluded"
                );
                errors.push(ConfigurationError {
                    entry: name.to_string(),
                    provider: entry.provider.clone(),
                    reason: format!("no factory registered for id {:?}", entry.provider),
                });
                continue;
            };
            let mut descriptor = ProviderDescriptor::new(name, entry.priority, factory);
            if let Some(capability) = &entry.capability {
                descriptor = descriptor.with_capability(capability.clone());
            }
            descriptors.push(descriptor);
        }

        (descriptors, errors)
    }
}
