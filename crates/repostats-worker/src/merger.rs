use std::path::Path;
use std::sync::Arc;

use crate::Result;
use repostats_core::{AggregatedResult, FetchStatus};
use repostats_store::ResultStore;

/// Reads every stored partial result and reduces them into one aggregate.
/// Read-only over the store; re-running with the same stored records yields
/// a bit-identical aggregate.
pub struct Merger {
    store: Arc<dyn ResultStore>,
}

impl Merger {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    /// Merge all currently stored partial results.
    ///
    /// Fails with `NoDataAvailable` on an empty store rather than publishing
    /// a misleading "0 repositories found" aggregate.
    pub async fn merge(&self) -> Result<AggregatedResult> {
        let partials = self.store.scan_partials().await?;

        for partial in &partials {
            match partial.status {
                FetchStatus::Failed => tracing::warn!(
                    "Worker {} stored a FAILED result; it contributes no records",
                    partial.worker_index
                ),
                FetchStatus::Partial => tracing::info!(
                    "Worker {} stored a PARTIAL result ({} repos sampled)",
                    partial.worker_index,
                    partial.sample_size
                ),
                FetchStatus::Complete => {}
            }
        }

        let aggregated = repostats_core::merge(&partials)?;

        tracing::info!(
            "Merged {} partial results: {} repos sampled of ~{} matching across [{}, {})",
            partials.len(),
            aggregated.total_sample_size,
            aggregated.total_population_estimate,
            aggregated.min_date,
            aggregated.max_date
        );
        Ok(aggregated)
    }

    /// Merge and write the finalized artifact consumed by the visualization
    /// front-end as-is.
    pub async fn write_artifact(&self, path: &Path) -> Result<AggregatedResult> {
        let aggregated = self.merge().await?;

        let json = serde_json::to_string_pretty(&aggregated)
            .map_err(|e| anyhow::anyhow!("failed to serialize aggregate: {}", e))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))?;

        tracing::info!("Wrote aggregated artifact to {}", path.display());
        Ok(aggregated)
    }
}
