use std::path::PathBuf;
use std::sync::Arc;

/// Errors surfaced by provider dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The provider factory failed. The descriptor stays unusable for the
    /// lifetime of the service; every later call reports the same message.
    #[error("provider {provider} failed to instantiate: {message}")]
    Instantiation {
        provider: Arc<str>,
        message: Arc<str>,
    },
    #[error("provider {provider} failed to execute")]
    Execution {
        provider: Arc<str>,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// Name of the provider the error originated from.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            DispatchError::Instantiation { provider, .. }
            | DispatchError::Execution { provider, .. } => provider,
        }
    }
}

/// Errors from loading a `ServiceConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid service config")]
    Parse(#[from] toml::de::Error),
}

/// A configured provider entry that could not be turned into a descriptor.
///
/// Recorded by the service and excluded from dispatch; the other entries are
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider entry {entry:?} excluded: {reason}")]
pub struct ConfigurationError {
    /// Name of the configured entry.
    pub entry: String,
    /// Catalog id the entry referred to.
    pub provider: String,
    pub reason: String,
}
