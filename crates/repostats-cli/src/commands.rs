use anyhow::Result;
use std::sync::Arc;

use crate::cli::Commands;
use repostats_core::{partition, FetchStatus};
use repostats_github::{RateLimitedFetcher, SearchClient};
use repostats_queue::PgWorkQueue;
use repostats_store::PgResultStore;
use repostats_worker::{Dispatcher, Merger, Settings, Worker};

pub async fn execute(command: Commands, settings: Settings) -> Result<()> {
    match command {
        Commands::Dispatch { num_days, workers } => {
            let queue = PgWorkQueue::new(settings.database_url()?).await?;
            queue.init_schema().await?;

            let dispatcher = Dispatcher::new(Arc::new(queue));
            let assignments = dispatcher.dispatch(num_days, workers).await?;

            println!(
                "✓ Dispatched {} assignments of {} days each",
                assignments.len(),
                num_days
            );
            for assignment in &assignments {
                println!(
                    "  Worker {}: [{}, {})",
                    assignment.worker_index, assignment.start_date, assignment.end_date
                );
            }
        }

        Commands::Worker { num_days, index } => {
            let assignment = partition(num_days, index)?;
            println!(
                "Fetching [{}, {}) as worker {}...",
                assignment.start_date, assignment.end_date, index
            );

            let store = PgResultStore::new(settings.database_url()?).await?;
            store.init_schema().await?;

            let client = SearchClient::new(
                &settings.github_api_base,
                &settings.github_token,
                settings.fetch.clone(),
            )?;
            let fetcher = RateLimitedFetcher::new(client, settings.filters.clone());
            let worker = Worker::new(
                fetcher,
                Arc::new(store),
                settings.store_write_attempts,
                settings.store_write_backoff,
            );

            let partial = worker.run(&assignment).await?;

            println!("✓ Worker {} finished: {}", index, partial.status.as_str());
            println!(
                "  Sampled {} of ~{} matching repositories",
                partial.sample_size, partial.population_estimate
            );
            for entry in partial.language_stats.iter().take(10) {
                println!("  {:>8}  {}", entry.repository_count, entry.language);
            }

            if partial.status == FetchStatus::Failed {
                anyhow::bail!("fetch yielded no data for worker {}", index);
            }
        }

        Commands::Merge { output, top } => {
            let store = PgResultStore::new(settings.database_url()?).await?;
            let merger = Merger::new(Arc::new(store));

            let aggregated = match output {
                Some(ref path) => merger.write_artifact(path).await?,
                None => merger.merge().await?,
            };

            println!(
                "✓ Aggregated [{}, {}): {} repositories sampled of ~{} matching",
                aggregated.min_date,
                aggregated.max_date,
                aggregated.total_sample_size,
                aggregated.total_population_estimate
            );
            for entry in aggregated.merged_language_stats.iter().take(top) {
                println!("  {:>8}  {}", entry.repository_count, entry.language);
            }
            if let Some(path) = output {
                println!("  Written to {}", path.display());
            }
        }

        Commands::InitDb => {
            let url = settings.database_url()?;

            let queue = PgWorkQueue::new(url).await?;
            queue.init_schema().await?;

            let store = PgResultStore::new(url).await?;
            store.init_schema().await?;

            println!("✓ Database schema initialized");
        }
    }

    Ok(())
}
