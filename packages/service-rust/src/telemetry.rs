//! Tracing subscriber bootstrap for binaries embedding the service.
//!
//! Library code only emits events; installing a subscriber is left to the
//! application, usually once at the top of `main`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable consulted first for the filter directive.
pub const LOG_ENV: &str = "SWITCHYARD_LOG";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Filter from `SWITCHYARD_LOG`, then `RUST_LOG`, then `default_directive`.
#[must_use]
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Installs a global subscriber writing to stderr.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let registry = Registry::default().with(env_filter("info"));
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }
    tracing::debug!(?format, "tracing initialized");
    Ok(())
}
