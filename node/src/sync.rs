//! Sync layer for a node without peers.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use weave_dag::{SyncError, SyncLayer, Unit};
use weave_types::Hash;

/// Nobody to ask, nobody to tell: fetches find nothing and broadcasts are
/// only logged.
#[derive(Default)]
pub struct IsolatedSync {
    broadcasts: AtomicU64,
}

impl IsolatedSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SyncLayer for IsolatedSync {
    async fn fetch_unit(&self, hash: &Hash) -> Result<Option<Unit>, SyncError> {
        tracing::trace!(hash = %hash, "no peers to fetch from");
        Ok(None)
    }

    async fn broadcast_unit(&self, unit: &Unit) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(hash = %unit.hash(), "broadcast skipped, node is isolated");
    }
}
