//! Lazily-instantiated provider registration.
//!
//! A [`ProviderDescriptor`] stands in for one registered provider. It answers
//! `provides` from a declarative policy or capability when it can, and only
//! runs the provider factory when the real provider has to be consulted.

use std::fmt;
use std::sync::{Arc, OnceLock};

use switchyard_core::{Capability, Operation, ProviderPriority};
use tracing::{debug, trace, warn};

use crate::error::DispatchError;
use crate::notify::{ChangeNotifier, ProviderChangeEvent};
use crate::traits::{Policy, Provider, ProviderFactory};

type Slot<O, R> = Result<Arc<dyn Provider<O, R>>, Arc<str>>;

/// One registered provider: its priority, its factory, and optional cheap
/// checks that avoid instantiating it.
///
/// The factory runs at most once, even under concurrent first use. A failed
/// factory leaves the descriptor permanently unusable.
pub struct ProviderDescriptor<O: Operation, R> {
    name: Arc<str>,
    priority: ProviderPriority,
    factory: ProviderFactory<O, R>,
    policy: Option<Policy<O>>,
    capability: Option<Capability>,
    provider: OnceLock<Slot<O, R>>,
    notifier: Arc<ChangeNotifier>,
}

impl<O, R> ProviderDescriptor<O, R>
where
    O: Operation + 'static,
    R: 'static,
{
    /// Creates a descriptor whose provider is built by `factory` on first use.
    #[must_use]
    pub fn new(
        name: impl Into<Arc<str>>,
        priority: ProviderPriority,
        factory: ProviderFactory<O, R>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            factory,
            policy: None,
            capability: None,
            provider: OnceLock::new(),
            notifier: Arc::new(ChangeNotifier::new()),
        }
    }

    /// Attaches a declarative policy. When present, `provides` is answered
    /// by the policy alone and never instantiates the provider.
    #[must_use]
    pub fn with_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&O) -> bool + Send + Sync + 'static,
    {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Attaches static capability metadata, used to reject operations before
    /// the provider exists.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn priority(&self) -> ProviderPriority {
        self.priority
    }

    #[must_use]
    pub fn capability(&self) -> Option<&Capability> {
        self.capability.as_ref()
    }

    /// Whether the factory has run and produced a provider.
    #[must_use]
    pub fn is_instantiated(&self) -> bool {
        matches!(self.provider.get(), Some(Ok(_)))
    }

    /// Events announced by the wrapped provider are re-broadcast here once
    /// the provider has been instantiated.
    #[must_use]
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Whether the wrapped provider can satisfy `op`.
    ///
    /// Order of evaluation: the declarative policy if any; otherwise, while
    /// no provider instance exists (including after a failed factory), the
    /// capability metadata may reject `op`; otherwise the provider is
    /// instantiated and asked directly.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Instantiation`] if the factory failed, now or
    /// on an earlier call, for an operation the capability does not reject.
    pub fn provides(&self, op: &O) -> Result<bool, DispatchError> {
        if let Some(policy) = &self.policy {
            return Ok(policy(op));
        }
        if !self.is_instantiated() {
            if let Some(capability) = &self.capability {
                if !capability.matches(op) {
                    trace!(provider = %self.name, kind = op.kind(), "rejected by capability");
                    return Ok(false);
                }
            }
        }
        Ok(self.provider()?.provides(op))
    }

    /// Executes `op` on the wrapped provider, instantiating it if needed.
    ///
    /// Callers must have seen `provides(op) == true` in the same pass.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Instantiation`] if the factory failed, or
    /// [`DispatchError::Execution`] wrapping the provider's own error.
    pub fn execute(&self, op: &O) -> Result<R, DispatchError> {
        self.provider()?
            .execute(op)
            .map_err(|source| DispatchError::Execution {
                provider: Arc::clone(&self.name),
                source,
            })
    }

    fn provider(&self) -> Result<&Arc<dyn Provider<O, R>>, DispatchError> {
        self.provider
            .get_or_init(|| self.instantiate())
            .as_ref()
            .map_err(|message| DispatchError::Instantiation {
                provider: Arc::clone(&self.name),
                message: Arc::clone(message),
            })
    }

    fn instantiate(&self) -> Slot<O, R> {
        match (self.factory)() {
            Ok(provider) => {
                debug!(provider = %self.name, priority = %self.priority, "provider instantiated");
                if let Some(source) = provider.change_notifier() {
                    let forward = Arc::clone(&self.notifier);
                    source.add_listener(Arc::new(move |event: &ProviderChangeEvent| {
                        forward.fire_changed(event);
                    }));
                }
                Ok(provider)
            }
            Err(err) => {
                let message: Arc<str> = format!("{err:#}").into();
                warn!(
                    provider = %self.name,
                    error = %message,
                    "provider instantiation failed; descriptor disabled"
                );
                Err(message)
            }
        }
    }
}

impl<O: Operation, R> fmt::Display for ProviderDescriptor<O, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.priority)
    }
}

impl<O: Operation, R> fmt::Debug for ProviderDescriptor<O, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("has_policy", &self.policy.is_some())
            .field("capability", &self.capability)
            .field("instantiated", &matches!(self.provider.get(), Some(Ok(_))))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::traits::factory;

    #[derive(Debug)]
    struct Query {
        kind: &'static str,
    }

    impl Operation for Query {
        type Key = &'static str;

        fn kind(&self) -> &str {
            self.kind
        }
    }

    /// Provider that counts calls and accepts a single operation kind.
    struct KindProvider {
        accepts: &'static str,
        provides_calls: Arc<AtomicUsize>,
        notifier: ChangeNotifier,
    }

    impl Provider<Query, String> for KindProvider {
        fn provides(&self, op: &Query) -> bool {
            self.provides_calls.fetch_add(1, Ordering::SeqCst);
            op.kind == self.accepts
        }

        fn execute(&self, op: &Query) -> anyhow::Result<String> {
            if op.kind == "explode" {
                anyhow::bail!("cannot handle {}", op.kind);
            }
            Ok(format!("handled:{}", op.kind))
        }

        fn change_notifier(&self) -> Option<&ChangeNotifier> {
            Some(&self.notifier)
        }
    }

    struct Counters {
        created: Arc<AtomicUsize>,
        provides_calls: Arc<AtomicUsize>,
    }

    fn counting_descriptor(accepts: &'static str) -> (ProviderDescriptor<Query, String>, Counters) {
        let created = Arc::new(AtomicUsize::new(0));
        let provides_calls = Arc::new(AtomicUsize::new(0));
        let counters = Counters {
            created: Arc::clone(&created),
            provides_calls: Arc::clone(&provides_calls),
        };
        let descriptor = ProviderDescriptor::new(
            "kind-provider",
            ProviderPriority::Medium,
            factory(move || {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(KindProvider {
                    accepts,
                    provides_calls: Arc::clone(&provides_calls),
                    notifier: ChangeNotifier::new(),
                })
            }),
        );
        (descriptor, counters)
    }

    #[test]
    fn policy_answers_without_instantiating() {
        let (descriptor, counters) = counting_descriptor("create-node");
        let descriptor = descriptor.with_policy(|op: &Query| op.kind == "create-node");

        assert!(descriptor.provides(&Query { kind: "create-node" }).unwrap());
        assert!(!descriptor.provides(&Query { kind: "create-edge" }).unwrap());
        assert_eq!(counters.created.load(Ordering::SeqCst), 0);
        assert!(!descriptor.is_instantiated());
    }

    #[test]
    fn capability_mismatch_skips_instantiation() {
        let (descriptor, counters) = counting_descriptor("create-node");
        let descriptor = descriptor.with_capability(Capability::kinds(["create-node"]));

        assert!(!descriptor.provides(&Query { kind: "create-edge" }).unwrap());
        assert_eq!(counters.created.load(Ordering::SeqCst), 0);

        assert!(descriptor.provides(&Query { kind: "create-node" }).unwrap());
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(counters.provides_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capability_is_bypassed_once_provider_exists() {
        let (descriptor, counters) = counting_descriptor("create-node");
        let descriptor = descriptor.with_capability(Capability::kinds(["create-node"]));

        descriptor.provides(&Query { kind: "create-node" }).unwrap();
        assert!(!descriptor.provides(&Query { kind: "create-edge" }).unwrap());
        assert_eq!(counters.provides_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn execute_instantiates_and_delegates() {
        let (descriptor, counters) = counting_descriptor("create-node");
        let out = descriptor.execute(&Query { kind: "create-node" }).unwrap();
        assert_eq!(out, "handled:create-node");
        assert!(descriptor.is_instantiated());
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn execution_error_names_the_provider() {
        let (descriptor, _) = counting_descriptor("explode");
        let err = descriptor.execute(&Query { kind: "explode" }).unwrap_err();
        assert!(matches!(err, DispatchError::Execution { .. }));
        assert_eq!(err.provider(), "kind-provider");
    }

    #[test]
    fn factory_runs_once_under_concurrent_first_use() {
        let (descriptor, counters) = counting_descriptor("create-node");
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    assert!(descriptor.provides(&Query { kind: "create-node" }).unwrap());
                });
            }
        });
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(counters.provides_calls.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn failed_factory_leaves_descriptor_unusable() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let make: ProviderFactory<Query, String> =
            Arc::new(move || -> anyhow::Result<Arc<dyn Provider<Query, String>>> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("missing plugin library"))
            });
        let descriptor = ProviderDescriptor::new("broken", ProviderPriority::High, make);

        let first = descriptor.provides(&Query { kind: "any" }).unwrap_err();
        let second = descriptor.execute(&Query { kind: "any" }).unwrap_err();

        for err in [&first, &second] {
            match err {
                DispatchError::Instantiation { provider, message } => {
                    assert_eq!(&**provider, "broken");
                    assert!(message.contains("missing plugin library"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!descriptor.is_instantiated());
    }

    #[test]
    fn failed_factory_still_honors_capability() {
        let make: ProviderFactory<Query, String> =
            Arc::new(|| -> anyhow::Result<Arc<dyn Provider<Query, String>>> {
                Err(anyhow::anyhow!("class not found"))
            });
        let descriptor = ProviderDescriptor::new("never-query", ProviderPriority::High, make)
            .with_capability(Capability::kinds(["query"]).negate());

        assert!(!descriptor.provides(&Query { kind: "query" }).unwrap());
        assert!(descriptor.execute(&Query { kind: "update" }).is_err());

        assert!(!descriptor.provides(&Query { kind: "query" }).unwrap());
        assert!(matches!(
            descriptor.provides(&Query { kind: "update" }),
            Err(DispatchError::Instantiation { .. })
        ));
    }

    #[test]
    fn provider_changes_are_forwarded_after_instantiation() {
        let (descriptor, _) = counting_descriptor("create-node");
        let seen = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&seen);
        descriptor
            .notifier()
            .add_listener(Arc::new(move |_: &ProviderChangeEvent| {
                hits.fetch_add(1, Ordering::SeqCst);
            }));

        let provider = descriptor.provider().unwrap();
        provider
            .change_notifier()
            .unwrap()
            .fire_changed(&ProviderChangeEvent::new("kind-provider"));

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn display_shows_name_and_priority() {
        let (descriptor, _) = counting_descriptor("x");
        assert_eq!(descriptor.to_string(), "kind-provider (MEDIUM)");
    }
}
