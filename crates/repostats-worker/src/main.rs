use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repostats_github::{RateLimitedFetcher, SearchClient};
use repostats_queue::{PgWorkQueue, WorkQueue};
use repostats_store::PgResultStore;
use repostats_worker::{Settings, Worker};

/// A message received but neither acked nor nacked (worker crash) comes back
/// after this long.
const LEASE_TIMEOUT: Duration = Duration::from_secs(3600);
const POLL_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repostats_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    tracing::info!("Starting repostats worker");

    let settings = Settings::from_env()?;
    let database_url = settings.database_url()?.to_string();

    let queue = PgWorkQueue::new(&database_url).await?;
    queue.init_schema().await?;

    let store = PgResultStore::new(&database_url).await?;
    store.init_schema().await?;
    let store = Arc::new(store);

    let client = SearchClient::new(
        &settings.github_api_base,
        &settings.github_token,
        settings.fetch.clone(),
    )?;
    let fetcher = RateLimitedFetcher::new(client, settings.filters.clone());

    let worker = Worker::new(
        fetcher,
        store,
        settings.store_write_attempts,
        settings.store_write_backoff,
    );

    let mut ticker = interval(POLL_INTERVAL);

    loop {
        ticker.tick().await;

        queue.requeue_stale(LEASE_TIMEOUT).await?;

        let Some(delivery) = queue.receive().await? else {
            continue;
        };

        let index = delivery.assignment.worker_index;
        tracing::info!("Received assignment for worker {}", index);

        match worker.run(&delivery.assignment).await {
            Ok(partial) => {
                tracing::info!(
                    "Assignment {} finished with status {}",
                    index,
                    partial.status.as_str()
                );
                queue.ack(delivery.receipt).await?;
            }
            Err(e) => {
                // Nothing was persisted; redeliver so another run can retry.
                tracing::error!("Assignment {} failed: {}", index, e);
                queue.nack(delivery.receipt).await?;
            }
        }
    }
}
