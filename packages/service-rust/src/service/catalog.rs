//! Explicit provider factory catalog.
//!
//! Configuration refers to providers by id; the catalog maps each id to the
//! factory closure that builds it. Nothing is constructed until a descriptor
//! created from the catalog actually needs its provider.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use switchyard_core::Operation;

use crate::traits::{factory, Provider, ProviderFactory};

/// Map from provider id to provider factory.
pub struct ProviderCatalog<O: Operation, R> {
    factories: HashMap<String, ProviderFactory<O, R>>,
}

impl<O, R> ProviderCatalog<O, R>
where
    O: Operation + 'static,
    R: 'static,
{
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers `factory` under `id`, replacing any previous registration.
    pub fn register(&mut self, id: impl Into<String>, factory: ProviderFactory<O, R>) -> &mut Self {
        self.factories.insert(id.into(), factory);
        self
    }

    /// Registers a constructor closure under `id`.
    pub fn register_with<P, F>(&mut self, id: impl Into<String>, make: F) -> &mut Self
    where
        P: Provider<O, R> + 'static,
        F: Fn() -> anyhow::Result<P> + Send + Sync + 'static,
    {
        self.register(id, factory(make))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<ProviderFactory<O, R>> {
        self.factories.get(id).map(Arc::clone)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<O, R> Default for ProviderCatalog<O, R>
where
    O: Operation + 'static,
    R: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Operation, R> fmt::Debug for ProviderCatalog<O, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.factories.keys().collect();
        ids.sort_unstable();
        f.debug_struct("ProviderCatalog").field("ids", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    impl Operation for Ping {
        type Key = ();

        fn kind(&self) -> &str {
            "ping"
        }
    }

    struct Pong;

    impl Provider<Ping, &'static str> for Pong {
        fn provides(&self, _op: &Ping) -> bool {
            true
        }

        fn execute(&self, _op: &Ping) -> anyhow::Result<&'static str> {
            Ok("pong")
        }
    }

    #[test]
    fn registered_factories_are_found_by_id() {
        let mut catalog: ProviderCatalog<Ping, &'static str> = ProviderCatalog::new();
        catalog
            .register_with("net.pong", || Ok(Pong))
            .register_with("net.pong-2", || Ok(Pong));

        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("net.pong"));
        assert!(!catalog.contains("net.ping"));
        assert_eq!(catalog.ids(), vec!["net.pong", "net.pong-2"]);

        let make = catalog.get("net.pong").unwrap();
        let provider = make().unwrap();
        assert_eq!(provider.execute(&Ping).unwrap(), "pong");
    }

    #[test]
    fn empty_catalog() {
        let catalog: ProviderCatalog<Ping, &'static str> = ProviderCatalog::default();
        assert!(catalog.is_empty());
        assert!(catalog.get("anything").is_none());
    }
}
