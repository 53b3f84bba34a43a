//! Shared test doubles for the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use switchyard_service::{
    factory, ChangeNotifier, Operation, Provider, ProviderDescriptor, ProviderPriority,
};

/// Operation with an optional caching key.
#[derive(Debug, Clone)]
pub struct Query {
    pub key: Option<u32>,
}

impl Query {
    pub fn keyed(key: u32) -> Self {
        Self { key: Some(key) }
    }

    pub fn unkeyed() -> Self {
        Self { key: None }
    }
}

impl Operation for Query {
    type Key = u32;

    fn kind(&self) -> &str {
        "query"
    }

    fn caching_key(&self) -> Option<u32> {
        self.key
    }
}

/// Per-descriptor call counters.
#[derive(Debug, Default)]
pub struct Calls {
    pub created: AtomicUsize,
    pub provides: AtomicUsize,
    pub execute: AtomicUsize,
}

impl Calls {
    pub fn provides(&self) -> usize {
        self.provides.load(Ordering::SeqCst)
    }

    pub fn execute(&self) -> usize {
        self.execute.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

/// Provider with a fixed `provides` answer and a fixed result.
pub struct Fixed {
    provides: bool,
    result: Option<String>,
    calls: Arc<Calls>,
    notifier: ChangeNotifier,
}

impl Provider<Query, String> for Fixed {
    fn provides(&self, _op: &Query) -> bool {
        self.calls.provides.fetch_add(1, Ordering::SeqCst);
        self.provides
    }

    fn execute(&self, _op: &Query) -> anyhow::Result<String> {
        self.calls.execute.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .ok_or_else(|| anyhow::anyhow!("provider has no result"))
    }

    fn change_notifier(&self) -> Option<&ChangeNotifier> {
        Some(&self.notifier)
    }
}

/// Descriptor over a [`Fixed`] provider; `result: None` makes `execute` fail.
pub fn fixed(
    name: &str,
    priority: ProviderPriority,
    provides: bool,
    result: Option<&str>,
) -> (ProviderDescriptor<Query, String>, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let shared = Arc::clone(&calls);
    let result = result.map(str::to_string);
    let descriptor = ProviderDescriptor::new(
        name.to_string(),
        priority,
        factory(move || {
            shared.created.fetch_add(1, Ordering::SeqCst);
            Ok(Fixed {
                provides,
                result: result.clone(),
                calls: Arc::clone(&shared),
                notifier: ChangeNotifier::new(),
            })
        }),
    );
    (descriptor, calls)
}
