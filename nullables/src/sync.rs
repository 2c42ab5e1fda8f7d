//! Nullable sync layer: scripted peers, recorded traffic.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use weave_dag::{SyncError, SyncLayer, Unit};
use weave_types::Hash;

/// A sync layer that answers fetches from units offered up front and
/// records what the node asked for and broadcast.
#[derive(Default)]
pub struct NullSyncLayer {
    /// Units "held by peers".
    available: Mutex<HashMap<Hash, Unit>>,
    fetches: Mutex<Vec<Hash>>,
    broadcasts: Mutex<Vec<Unit>>,
    unreachable: AtomicBool,
    /// Added before every fetch answer.
    latency: Mutex<Option<Duration>>,
}

impl NullSyncLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `unit` fetchable.
    pub fn offer(&self, unit: Unit) {
        self.available.lock().insert(unit.hash(), unit);
    }

    /// Stop serving `hash`.
    pub fn withhold(&self, hash: &Hash) {
        self.available.lock().remove(hash);
    }

    /// While set, every fetch fails with `SyncError::Unreachable`.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Every fetch request so far, in order.
    pub fn fetch_requests(&self) -> Vec<Hash> {
        self.fetches.lock().clone()
    }

    pub fn fetch_count(&self, hash: &Hash) -> usize {
        self.fetches.lock().iter().filter(|h| *h == hash).count()
    }

    /// Every unit handed over for broadcast, in order.
    pub fn broadcasts(&self) -> Vec<Unit> {
        self.broadcasts.lock().clone()
    }

    /// Clear recorded traffic.
    pub fn reset(&self) {
        self.fetches.lock().clear();
        self.broadcasts.lock().clear();
    }
}

#[async_trait]
impl SyncLayer for NullSyncLayer {
    async fn fetch_unit(&self, hash: &Hash) -> Result<Option<Unit>, SyncError> {
        self.fetches.lock().push(*hash);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::Unreachable);
        }
        Ok(self.available.lock().get(hash).cloned())
    }

    async fn broadcast_unit(&self, unit: &Unit) {
        self.broadcasts.lock().push(unit.clone());
    }
}
