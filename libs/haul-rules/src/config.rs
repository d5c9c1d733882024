//! Referential configuration and its change bus
//!
//! [`ConfigBus`] keeps the current [`ReferentialConfig`] snapshot and notifies subscribers on
//! every emission. Subscriptions end when their [`Subscription`] handle is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use haul_batch::referential::{PmfmIds, QualitativeValueIds};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifier tables that rule sets depend on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferentialConfig {
    pub pmfm_ids: PmfmIds,
    pub qualitative_value_ids: QualitativeValueIds,
}

type Listener = Arc<dyn Fn(&ReferentialConfig) + Send + Sync>;

struct BusInner {
    current: RwLock<Arc<ReferentialConfig>>,
    listeners: RwLock<FxHashMap<u64, Listener>>,
    next_id: AtomicU64,
}

/// In-process publisher of configuration snapshots
#[derive(Clone)]
pub struct ConfigBus {
    inner: Arc<BusInner>,
}

impl ConfigBus {
    pub fn new(initial: ReferentialConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                current: RwLock::new(Arc::new(initial)),
                listeners: RwLock::new(FxHashMap::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Latest emitted snapshot
    pub fn current(&self) -> Arc<ReferentialConfig> {
        Arc::clone(&self.inner.current.read())
    }

    pub fn subscribe(&self, listener: impl Fn(&ReferentialConfig) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().insert(id, Arc::new(listener));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Store `config` as current and notify every subscriber
    pub fn emit(&self, config: ReferentialConfig) {
        let config = Arc::new(config);
        *self.inner.current.write() = Arc::clone(&config);

        // listeners may subscribe or unsubscribe while being notified
        let listeners: Vec<Listener> = self.inner.listeners.read().values().cloned().collect();
        debug!(listeners = listeners.len(), "Referential configuration emitted");
        for listener in listeners {
            listener(&config);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}

impl Default for ConfigBus {
    fn default() -> Self {
        Self::new(ReferentialConfig::default())
    }
}

impl std::fmt::Debug for ConfigBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBus")
            .field("current", &*self.current())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Subscription handle; unsubscribes on drop
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.listeners.write().remove(&self.id);
        }
    }
}
