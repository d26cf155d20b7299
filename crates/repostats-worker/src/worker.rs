use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{Error, Result};
use repostats_core::{FetchStatus, LanguageAggregator, PartialResult, WorkAssignment};
use repostats_github::{FetchEnd, RateLimitedFetcher};
use repostats_store::ResultStore;

/// Consumer side of the pipeline. One run moves strictly through
/// fetch → aggregate → persist; the final per-language counts only mean
/// anything once the whole range has been seen, so the phases never overlap.
pub struct Worker {
    fetcher: RateLimitedFetcher,
    store: Arc<dyn ResultStore>,
    write_attempts: u32,
    write_backoff: Duration,
}

impl Worker {
    pub fn new(
        fetcher: RateLimitedFetcher,
        store: Arc<dyn ResultStore>,
        write_attempts: u32,
        write_backoff: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            write_attempts: write_attempts.max(1),
            write_backoff,
        }
    }

    /// Process one assignment end to end and persist the partial result.
    ///
    /// A fatal fetch error (rejected credential, dead quota) propagates
    /// without touching the store, so an interrupted run looks the same as a
    /// run that never happened and is safe to re-dispatch. Everything else
    /// lands in the stored record's status field.
    pub async fn run(&self, assignment: &WorkAssignment) -> Result<PartialResult> {
        tracing::info!(
            "Worker {} fetching [{}, {})",
            assignment.worker_index,
            assignment.start_date,
            assignment.end_date
        );

        let mut stream = self.fetcher.fetch(assignment);
        let mut aggregator = LanguageAggregator::new();

        while let Some(record) = stream.next().await {
            aggregator.observe(&record);
        }
        let outcome = stream.outcome().await;

        let status = match outcome.end {
            FetchEnd::Completed => FetchStatus::Complete,
            FetchEnd::Truncated {
                first_request_failed,
            } => {
                if outcome.records_yielded == 0 && first_request_failed {
                    FetchStatus::Failed
                } else {
                    FetchStatus::Partial
                }
            }
            FetchEnd::Fatal(e) => {
                tracing::error!("Worker {} fetch failed: {}", assignment.worker_index, e);
                return Err(Error::Fetch(e));
            }
        };

        let partial = PartialResult {
            worker_index: assignment.worker_index,
            start_date: assignment.start_date,
            end_date: assignment.end_date,
            sample_size: aggregator.records_seen(),
            population_estimate: outcome.population_estimate,
            language_stats: aggregator.into_stats(),
            completed_at: Utc::now(),
            status,
        };

        self.persist(&partial).await?;

        tracing::info!(
            "Worker {} done: {} repos sampled of ~{} matching, status {}",
            partial.worker_index,
            partial.sample_size,
            partial.population_estimate,
            partial.status.as_str()
        );
        Ok(partial)
    }

    /// Upsert with bounded backoff. The store's overwrite-by-key semantics
    /// mean a retry after a failed write can never corrupt the previous
    /// record for this index.
    async fn persist(&self, partial: &PartialResult) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.upsert_partial(partial).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.write_attempts => {
                    tracing::error!(
                        "Giving up persisting worker {} result: {}",
                        partial.worker_index,
                        e
                    );
                    return Err(Error::Store(e));
                }
                Err(e) => {
                    let backoff = self.write_backoff * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        "Persist attempt {} for worker {} failed ({}), retrying in {:?}",
                        attempt,
                        partial.worker_index,
                        e,
                        backoff
                    );
                    sleep(backoff).await;
                }
            }
        }
    }
}
