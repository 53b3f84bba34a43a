//! Runs one operation through a configured provider service and prints the
//! results as JSON.
//!
//! ```text
//! switchyard --kind transform --subject "hello" --strategy REVERSE_ALL
//! switchyard --config providers.toml --kind measure --subject "hello"
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use switchyard_service::telemetry::{self, LogFormat};
use switchyard_service::{
    ExecutionStrategy, Operation, Provider, ProviderCatalog, ProviderService, ServiceConfig,
};

const DEFAULT_CONFIG: &str = r#"
[settings]
failure_policy = "ABORT"
caching = true

[[providers]]
name = "upper"
provider = "text.upper"
priority = "HIGH"
capability = { type = "kinds", kinds = ["transform"] }

[[providers]]
name = "reverse"
provider = "text.reverse"
priority = "MEDIUM"
capability = { type = "kinds", kinds = ["transform"] }

[[providers]]
name = "length"
provider = "text.length"
priority = "LOW"
capability = { type = "kinds", kinds = ["measure"] }
"#;

#[derive(Debug, Parser)]
#[command(name = "switchyard", about = "Dispatch an operation to configured providers")]
struct Args {
    /// TOML service configuration. Uses a built-in text provider set if omitted.
    #[arg(long, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,
    /// FIRST, FORWARD_ALL or REVERSE_ALL.
    #[arg(long, default_value = "FORWARD_ALL")]
    strategy: ExecutionStrategy,
    /// Operation kind, e.g. `transform` or `measure`.
    #[arg(long, default_value = "transform")]
    kind: String,
    #[arg(long, default_value = "switchyard")]
    subject: String,
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

/// Text operation keyed by `(kind, subject)`.
#[derive(Debug)]
struct TextRequest {
    kind: String,
    subject: String,
}

impl Operation for TextRequest {
    type Key = (String, String);

    fn kind(&self) -> &str {
        &self.kind
    }

    fn caching_key(&self) -> Option<Self::Key> {
        Some((self.kind.clone(), self.subject.clone()))
    }

    fn hint(&self, name: &str) -> Option<&str> {
        (name == "subject").then_some(self.subject.as_str())
    }
}

/// Provider answering one operation kind with a pure text function.
struct TextProvider {
    kind: &'static str,
    apply: fn(&str) -> String,
}

impl Provider<TextRequest, String> for TextProvider {
    fn provides(&self, op: &TextRequest) -> bool {
        op.kind == self.kind
    }

    fn execute(&self, op: &TextRequest) -> anyhow::Result<String> {
        Ok((self.apply)(&op.subject))
    }
}

fn catalog() -> ProviderCatalog<TextRequest, String> {
    let mut catalog = ProviderCatalog::new();
    catalog
        .register_with("text.upper", || {
            Ok(TextProvider {
                kind: "transform",
                apply: str::to_uppercase,
            })
        })
        .register_with("text.reverse", || {
            Ok(TextProvider {
                kind: "transform",
                apply: |s| s.chars().rev().collect(),
            })
        })
        .register_with("text.length", || {
            Ok(TextProvider {
                kind: "measure",
                apply: |s| s.chars().count().to_string(),
            })
        });
    catalog
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init_tracing(args.log_format)?;

    let config = match &args.config {
        Some(path) => ServiceConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServiceConfig::from_toml_str(DEFAULT_CONFIG)?,
    };
    let service = ProviderService::from_config(&config, &catalog());

    let op = TextRequest {
        kind: args.kind,
        subject: args.subject,
    };
    let results = service.execute(args.strategy, &op)?;
    // Same key: answered from the cache.
    let repeated = service.execute(args.strategy, &op)?;

    let errors: Vec<String> = service
        .configuration_errors()
        .iter()
        .map(ToString::to_string)
        .collect();
    let report = json!({
        "strategy": args.strategy,
        "kind": op.kind,
        "results": results,
        "repeat_matches": repeated == results,
        "cached_entries": service.cached_entries(),
        "providers": service
            .descriptors()
            .iter()
            .map(|d| json!({
                "name": d.name(),
                "priority": d.priority(),
                "instantiated": d.is_instantiated(),
            }))
            .collect::<Vec<_>>(),
        "configuration_errors": errors,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
