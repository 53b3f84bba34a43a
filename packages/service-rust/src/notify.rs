//! Provider change notification.
//!
//! Defines [`ProviderChangeListener`] for reacting to "a provider's capability
//! set changed" events, and [`ChangeNotifier`], which fans a single event out
//! to every registered listener.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

/// Event broadcast when a provider's state changed externally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderChangeEvent {
    /// Name of the provider (or service) that changed.
    pub provider: Arc<str>,
    /// Optional human-readable reason, for logs.
    pub reason: Option<String>,
}

impl ProviderChangeEvent {
    #[must_use]
    pub fn new(provider: impl Into<Arc<str>>) -> Self {
        Self {
            provider: provider.into(),
            reason: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Observer of provider change events.
///
/// Used as `Arc<dyn ProviderChangeListener>`; closures taking
/// `&ProviderChangeEvent` implement it directly.
pub trait ProviderChangeListener: Send + Sync {
    fn provider_changed(&self, event: &ProviderChangeEvent);
}

impl<F> ProviderChangeListener for F
where
    F: Fn(&ProviderChangeEvent) + Send + Sync,
{
    fn provider_changed(&self, event: &ProviderChangeEvent) {
        self(event);
    }
}

/// Listener set with snapshot-then-deliver broadcast.
///
/// Listeners may be added or removed while a broadcast is running; the
/// in-flight broadcast delivers to the snapshot taken when it started.
/// Delivery is synchronous and in registration order. A panicking listener
/// is logged and skipped; the remaining listeners still receive the event.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: RwLock<Vec<Arc<dyn ProviderChangeListener>>>,
}

impl ChangeNotifier {
    /// Creates a notifier with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`. Registering the same `Arc` twice is a no-op.
    pub fn add_listener(&self, listener: Arc<dyn ProviderChangeListener>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Removes `listener` by identity. Returns whether it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn ProviderChangeListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Delivers `event` to every listener registered at call time.
    ///
    /// Returns the number of listeners that panicked.
    pub fn fire_changed(&self, event: &ProviderChangeEvent) -> usize {
        let snapshot = self.listeners.read().clone();
        let mut panicked = 0;
        for listener in &snapshot {
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| listener.provider_changed(event)));
            if delivered.is_err() {
                panicked += 1;
                tracing::error!(
                    provider = %event.provider,
                    "provider change listener panicked; continuing delivery"
                );
            }
        }
        panicked
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
