use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use switchyard_core::{ExecutionStrategy, FailurePolicy, Operation};
use tracing::{debug, info, trace, warn};

use super::catalog::ProviderCatalog;
use super::config::{ServiceConfig, ServiceSettings};
use super::descriptor::ProviderDescriptor;
use crate::error::{ConfigurationError, DispatchError};
use crate::notify::{ChangeNotifier, ProviderChangeEvent, ProviderChangeListener};

// ---------------------------------------------------------------------------
// OperationCache
// ---------------------------------------------------------------------------

/// Results memoized per `(strategy, caching key)`.
///
/// Entries are published whole. A commit is discarded if the cache was
/// invalidated while its dispatch was running.
struct OperationCache<K, R> {
    entries: DashMap<(ExecutionStrategy, K), Arc<Vec<R>>>,
    epoch: AtomicU64,
}

impl<K, R> OperationCache<K, R>
where
    K: Eq + std::hash::Hash + Clone,
{
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    fn get(&self, strategy: ExecutionStrategy, key: &K) -> Option<Arc<Vec<R>>> {
        self.entries
            .get(&(strategy, key.clone()))
            .map(|entry| Arc::clone(entry.value()))
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn commit(&self, strategy: ExecutionStrategy, key: K, epoch: u64, results: Arc<Vec<R>>) {
        if self.epoch() != epoch {
            return;
        }
        let slot = (strategy, key);
        self.entries.insert(slot.clone(), results);
        // Invalidation raced with the insert.
        if self.epoch() != epoch {
            self.entries.remove(&slot);
        }
    }

    fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// Dispatch state
// ---------------------------------------------------------------------------

/// Everything swapped atomically by `configure`.
struct Dispatch<O: Operation, R> {
    /// Sorted by descending priority, ties in registration order.
    descriptors: Vec<Arc<ProviderDescriptor<O, R>>>,
    cache: Arc<OperationCache<O::Key, R>>,
    /// Subscribed to every descriptor's notifier; clears `cache`.
    invalidator: Arc<dyn ProviderChangeListener>,
}

fn invalidator<K, R>(
    cache: &Arc<OperationCache<K, R>>,
    notifier: &Arc<ChangeNotifier>,
) -> Arc<dyn ProviderChangeListener>
where
    K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    let cache: Weak<OperationCache<K, R>> = Arc::downgrade(cache);
    let notifier = Arc::downgrade(notifier);
    Arc::new(move |event: &ProviderChangeEvent| {
        if let Some(cache) = cache.upgrade() {
            cache.invalidate();
            debug!(provider = %event.provider, "provider changed; operation cache cleared");
        }
        if let Some(notifier) = notifier.upgrade() {
            notifier.fire_changed(event);
        }
    })
}

// ---------------------------------------------------------------------------
// ProviderService
// ---------------------------------------------------------------------------

/// Priority-ordered provider registry and dispatcher.
///
/// Descriptors are sorted once per `configure` call and read lock-free from
/// an `ArcSwap` snapshot. Results of operations that carry a caching key are
/// memoized until a provider announces a change or the service is
/// reconfigured.
///
/// Construct one instance at application start and share it by reference
/// (or `Arc`) with every consumer.
pub struct ProviderService<O: Operation, R> {
    settings: ServiceSettings,
    state: ArcSwap<Dispatch<O, R>>,
    notifier: Arc<ChangeNotifier>,
    configuration_errors: RwLock<Vec<ConfigurationError>>,
    /// Serializes `configure` so listener hand-over sees a consistent state.
    configure_lock: Mutex<()>,
}

impl<O, R> ProviderService<O, R>
where
    O: Operation + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Creates a service with no providers.
    #[must_use]
    pub fn new(settings: ServiceSettings) -> Self {
        let notifier = Arc::new(ChangeNotifier::new());
        let cache = Arc::new(OperationCache::new());
        let state = Dispatch {
            descriptors: Vec::new(),
            invalidator: invalidator(&cache, &notifier),
            cache,
        };
        Self {
            settings,
            state: ArcSwap::from_pointee(state),
            notifier,
            configuration_errors: RwLock::new(Vec::new()),
            configure_lock: Mutex::new(()),
        }
    }

    /// Starts a builder with default settings and no providers.
    #[must_use]
    pub fn builder() -> ProviderServiceBuilder<O, R> {
        ProviderServiceBuilder::new()
    }

    /// Builds a service from declarative configuration.
    ///
    /// Entries that cannot be resolved against `catalog` are excluded and
    /// reported by [`configuration_errors`](Self::configuration_errors).
    #[must_use]
    pub fn from_config(config: &ServiceConfig, catalog: &ProviderCatalog<O, R>) -> Self {
        let (descriptors, errors) = config.resolve(catalog);
        let service = Self::new(config.settings.clone());
        service.install(descriptors, errors);
        service
    }

    #[must_use]
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Installs `descriptors`, replacing any previous set.
    ///
    /// Descriptors are stably sorted by descending priority. The new list and
    /// an empty cache are published in a single atomic swap. Configuration
    /// errors recorded by an earlier [`from_config`](Self::from_config) are
    /// cleared, since they describe a set that is no longer installed.
    pub fn configure<I, D>(&self, descriptors: I)
    where
        I: IntoIterator<Item = D>,
        D: Into<Arc<ProviderDescriptor<O, R>>>,
    {
        self.install(descriptors, Vec::new());
    }

    fn install<I, D>(&self, descriptors: I, errors: Vec<ConfigurationError>)
    where
        I: IntoIterator<Item = D>,
        D: Into<Arc<ProviderDescriptor<O, R>>>,
    {
        let _guard = self.configure_lock.lock();

        let mut sorted: Vec<Arc<ProviderDescriptor<O, R>>> =
            descriptors.into_iter().map(Into::into).collect();
        sorted.sort_by(|a, b| b.priority().cmp(&a.priority()));

        let cache = Arc::new(OperationCache::new());
        let listener = invalidator(&cache, &self.notifier);
        for descriptor in &sorted {
            descriptor.notifier().add_listener(Arc::clone(&listener));
        }
        let count = sorted.len();

        let previous = self.state.swap(Arc::new(Dispatch {
            descriptors: sorted,
            cache,
            invalidator: listener,
        }));
        for descriptor in &previous.descriptors {
            descriptor.notifier().remove_listener(&previous.invalidator);
        }
        previous.cache.invalidate();
        let excluded = errors.len();
        *self.configuration_errors.write() = errors;

        info!(providers = count, excluded, "provider service configured");
    }

    /// Dispatches `op` to providers under `strategy`.
    ///
    /// Results of operations with a caching key are memoized per strategy;
    /// a repeated query returns a copy of the stored list without consulting
    /// any provider. Failed dispatches are never cached.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Abort`], returns the first instantiation or
    /// execution error raised by a provider that was consulted.
    pub fn execute(&self, strategy: ExecutionStrategy, op: &O) -> Result<Vec<R>, DispatchError> {
        let state = self.state.load_full();
        let key = if self.settings.caching {
            op.caching_key()
        } else {
            None
        };

        if let Some(key) = &key {
            if let Some(hit) = state.cache.get(strategy, key) {
                debug!(%strategy, kind = op.kind(), ?key, "operation served from cache");
                return Ok(hit.as_ref().clone());
            }
        }

        let epoch = state.cache.epoch();
        let results = self.dispatch(&state.descriptors, strategy, op)?;

        if let Some(key) = key {
            state
                .cache
                .commit(strategy, key, epoch, Arc::new(results.clone()));
        }
        Ok(results)
    }

    /// Result of the highest priority provider that handles `op`, if any.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute) with [`ExecutionStrategy::First`].
    pub fn execute_first(&self, op: &O) -> Result<Option<R>, DispatchError> {
        Ok(self.execute(ExecutionStrategy::First, op)?.into_iter().next())
    }

    /// Whether at least one provider provides `op`. Never executes anything,
    /// but may instantiate providers.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Abort`], returns the first instantiation error.
    pub fn provides(&self, op: &O) -> Result<bool, DispatchError> {
        let state = self.state.load_full();
        for descriptor in &state.descriptors {
            match descriptor.provides(op) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(err) => self.on_failure(err)?,
            }
        }
        Ok(false)
    }

    fn dispatch(
        &self,
        descriptors: &[Arc<ProviderDescriptor<O, R>>],
        strategy: ExecutionStrategy,
        op: &O,
    ) -> Result<Vec<R>, DispatchError> {
        let mut results = Vec::new();
        for descriptor in strategy.ordered(descriptors) {
            trace!(provider = descriptor.name(), %strategy, "consulting provider");
            let outcome = match descriptor.provides(op) {
                Ok(false) => continue,
                Ok(true) => descriptor.execute(op),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(result) => {
                    results.push(result);
                    if strategy.stops_at_first_result() {
                        break;
                    }
                }
                Err(err) => self.on_failure(err)?,
            }
        }
        debug!(%strategy, kind = op.kind(), results = results.len(), "dispatch complete");
        Ok(results)
    }

    fn on_failure(&self, err: DispatchError) -> Result<(), DispatchError> {
        match self.settings.failure_policy {
            FailurePolicy::Abort => Err(err),
            FailurePolicy::SkipAndContinue => {
                warn!(provider = err.provider(), error = ?err, "skipping failed provider");
                Ok(())
            }
        }
    }

    /// Clears all memoized results and tells listeners the service changed.
    pub fn provider_changed(&self, event: &ProviderChangeEvent) {
        self.state.load().cache.invalidate();
        self.notifier.fire_changed(event);
    }

    /// Clears all memoized results.
    pub fn invalidate_cache(&self) {
        self.state.load().cache.invalidate();
    }

    /// Number of memoized `(strategy, key)` entries.
    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.state.load().cache.len()
    }

    /// Descriptors in dispatch order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Arc<ProviderDescriptor<O, R>>> {
        self.state.load().descriptors.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.load().descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.load().descriptors.is_empty()
    }

    /// Entries excluded by [`from_config`](Self::from_config), until the next
    /// [`configure`](Self::configure).
    #[must_use]
    pub fn configuration_errors(&self) -> Vec<ConfigurationError> {
        self.configuration_errors.read().clone()
    }

    /// Subscribes to change events of any provider in this service.
    pub fn add_listener(&self, listener: Arc<dyn ProviderChangeListener>) {
        self.notifier.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ProviderChangeListener>) -> bool {
        self.notifier.remove_listener(listener)
    }
}

impl<O, R> Default for ProviderService<O, R>
where
    O: Operation + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(ServiceSettings::default())
    }
}

impl<O: Operation, R> fmt::Debug for ProviderService<O, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load();
        f.debug_struct("ProviderService")
            .field("settings", &self.settings)
            .field("descriptors", &state.descriptors)
            .field("cached_entries", &state.cache.entries.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ProviderServiceBuilder
// ---------------------------------------------------------------------------

/// Collects settings and descriptors, then configures a service once.
pub struct ProviderServiceBuilder<O: Operation, R> {
    settings: ServiceSettings,
    descriptors: Vec<Arc<ProviderDescriptor<O, R>>>,
}

impl<O, R> ProviderServiceBuilder<O, R>
where
    O: Operation + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Creates a builder with default settings and no providers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: ServiceSettings::default(),
            descriptors: Vec::new(),
        }
    }

    #[must_use]
    pub fn settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.settings.failure_policy = policy;
        self
    }

    /// Registers a descriptor, owned or shared. Registration order breaks
    /// priority ties.
    #[must_use]
    pub fn register(mut self, descriptor: impl Into<Arc<ProviderDescriptor<O, R>>>) -> Self {
        self.descriptors.push(descriptor.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ProviderService<O, R> {
        let service = ProviderService::new(self.settings);
        service.configure(self.descriptors);
        service
    }
}

impl<O, R> Default for ProviderServiceBuilder<O, R>
where
    O: Operation + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
