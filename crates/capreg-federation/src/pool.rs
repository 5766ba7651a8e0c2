//! The per-alias connection cache (`spec.md` §4.6 step 2).
//!
//! Grounded on the teacher's `abp-host::pool::SidecarPool`: a named-resource
//! pool guarded by a single lock, entries looked up by a string key, stale
//! entries replaced rather than patched. Adapted here from `SidecarPool`'s
//! synchronous `Mutex<BTreeMap<..>>` to an async `RwLock`, since the double-
//! checked-locking shape the registry needs reads far more often (every
//! federated resolve) than it writes (first resolve per alias, or a
//! reconnect).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use capreg_bus::{Bus, BusError};
use tokio::sync::RwLock;

use crate::BusConnector;

const MAX_RECONNECTS: usize = 5;
const RECONNECT_WAIT: Duration = Duration::from_secs(2);

struct PoolEntry {
    bus: Arc<dyn Bus>,
}

/// A cache of live bus connections keyed by registry alias.
///
/// Acquiring a connection is double-checked: a shared read lock is tried
/// first so that the common case (an alias already connected) never
/// contends with other readers; only a cache miss or a dead connection
/// takes the exclusive write lock, and the write path re-checks before
/// opening a new connection in case another task won the race.
pub struct FederationPool<C: BusConnector> {
    connector: C,
    connections: RwLock<HashMap<String, PoolEntry>>,
}

impl<C: BusConnector> FederationPool<C> {
    /// Build an empty pool using `connector` to open new connections.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Acquire a live [`Bus`] handle for `alias`, reusing a cached
    /// connection to `nats_url` when one exists and still reports
    /// connected, opening a new one otherwise.
    ///
    /// # Errors
    ///
    /// Propagates [`BusError`] from the underlying connector on a cache
    /// miss or reconnect.
    pub async fn acquire(&self, alias: &str, nats_url: &str) -> Result<Arc<dyn Bus>, BusError> {
        if let Some(bus) = self.try_cached(alias).await {
            return Ok(bus);
        }

        let mut connections = self.connections.write().await;
        if let Some(entry) = connections.get(alias) {
            if entry.bus.is_connected().await {
                return Ok(entry.bus.clone());
            }
        }

        let client_name = format!("capabilities-registry-federation-{alias}");
        let bus = self
            .connector
            .connect(nats_url, &client_name, MAX_RECONNECTS, RECONNECT_WAIT)
            .await?;
        connections.insert(alias.to_string(), PoolEntry { bus: bus.clone() });
        Ok(bus)
    }

    async fn try_cached(&self, alias: &str) -> Option<Arc<dyn Bus>> {
        let connections = self.connections.read().await;
        let entry = connections.get(alias)?;
        if entry.bus.is_connected().await {
            Some(entry.bus.clone())
        } else {
            None
        }
    }

    /// Close every cached connection and empty the map (`spec.md` §4.6 `CloseAll`).
    pub async fn close_all(&self) {
        self.connections.write().await.clear();
    }

    /// Number of aliases currently holding a cached connection.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
