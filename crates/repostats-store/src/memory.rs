use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::ResultStore;
use crate::Result;
use repostats_core::PartialResult;

/// In-memory result store for tests and single-process runs. Same overwrite
/// semantics as the Postgres store: one record per worker index,
/// last write wins.
#[derive(Clone, Default)]
pub struct MemoryResultStore {
    records: Arc<RwLock<HashMap<u32, PartialResult>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn upsert_partial(&self, partial: &PartialResult) -> Result<()> {
        self.records
            .write()
            .await
            .insert(partial.worker_index, partial.clone());
        Ok(())
    }

    async fn scan_partials(&self) -> Result<Vec<PartialResult>> {
        let records = self.records.read().await;
        let mut partials: Vec<PartialResult> = records.values().cloned().collect();
        partials.sort_by_key(|p| p.worker_index);
        Ok(partials)
    }
}
