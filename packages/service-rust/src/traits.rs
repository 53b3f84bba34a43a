use std::sync::Arc;

use switchyard_core::Operation;

use crate::notify::ChangeNotifier;

/// Pluggable unit of extension behavior registered with a `ProviderService`.
///
/// A provider answers whether it can satisfy an operation and, if asked,
/// executes it. Providers are independent of each other; ordering between
/// them comes only from the priority they were registered with.
pub trait Provider<O: Operation, R>: Send + Sync {
    /// Whether this provider can satisfy `op`. Must not have side effects
    /// visible to other providers.
    fn provides(&self, op: &O) -> bool;

    /// Execute `op`. Only called after `provides(op)` returned true within
    /// the same dispatch pass.
    fn execute(&self, op: &O) -> anyhow::Result<R>;

    /// Notifier through which this provider announces that its capability
    /// set changed. Providers with static capabilities return `None`.
    fn change_notifier(&self) -> Option<&ChangeNotifier> {
        None
    }
}

/// Deferred constructor for a provider. Called at most once per descriptor.
pub type ProviderFactory<O, R> =
    Arc<dyn Fn() -> anyhow::Result<Arc<dyn Provider<O, R>>> + Send + Sync>;

/// Cheap declarative check that answers `provides` without instantiating
/// the provider.
pub type Policy<O> = Arc<dyn Fn(&O) -> bool + Send + Sync>;

/// Wraps a constructor closure into a [`ProviderFactory`].
pub fn factory<O, R, P, F>(make: F) -> ProviderFactory<O, R>
where
    O: Operation + 'static,
    R: 'static,
    P: Provider<O, R> + 'static,
    F: Fn() -> anyhow::Result<P> + Send + Sync + 'static,
{
    Arc::new(move || {
        let provider: Arc<dyn Provider<O, R>> = Arc::new(make()?);
        Ok(provider)
    })
}
