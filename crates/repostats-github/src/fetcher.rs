use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

use crate::client::{QueryFilters, SearchClient};
use crate::Error;
use repostats_core::{RepositoryRecord, WorkAssignment};

/// How a fetch sequence ended.
#[derive(Debug)]
pub enum FetchEnd {
    /// Every day in the range was fetched to completion.
    Completed,
    /// The sequence stopped early; records already yielded remain valid.
    /// `first_request_failed` distinguishes a fetch that never got a single
    /// successful response from one that merely gave up partway.
    Truncated { first_request_failed: bool },
    /// Auth or quota failure that retrying cannot fix.
    Fatal(Error),
}

/// Summary of a finished fetch, available once the stream is drained.
#[derive(Debug)]
pub struct FetchOutcome {
    pub end: FetchEnd,
    /// Sum of the API-reported match totals per day. May exceed
    /// `records_yielded` because of the per-query pagination cap.
    pub population_estimate: u64,
    pub records_yielded: u64,
}

/// Lazy, finite, non-restartable sequence of repository records.
///
/// Dropping the stream closes the channel, which stops the underlying fetch
/// task at its next send; there is no resume token, so a consumer that stops
/// simply ends the sequence.
pub struct RepoStream {
    rx: mpsc::Receiver<RepositoryRecord>,
    outcome_rx: oneshot::Receiver<FetchOutcome>,
}

impl RepoStream {
    /// Next record, or `None` once the sequence is exhausted.
    pub async fn next(&mut self) -> Option<RepositoryRecord> {
        self.rx.recv().await
    }

    /// Consume the stream and report how the fetch ended. Any records not yet
    /// taken are discarded and the fetch task is told to stop.
    pub async fn outcome(self) -> FetchOutcome {
        drop(self.rx);
        self.outcome_rx.await.unwrap_or(FetchOutcome {
            end: FetchEnd::Truncated {
                first_request_failed: false,
            },
            population_estimate: 0,
            records_yielded: 0,
        })
    }
}

/// Drives day-by-day paginated search queries over an assignment's range,
/// feeding records through a bounded channel.
#[derive(Clone)]
pub struct RateLimitedFetcher {
    client: SearchClient,
    filters: QueryFilters,
}

impl RateLimitedFetcher {
    pub fn new(client: SearchClient, filters: QueryFilters) -> Self {
        Self { client, filters }
    }

    pub fn fetch(&self, assignment: &WorkAssignment) -> RepoStream {
        let (tx, rx) = mpsc::channel(self.client.config().channel_capacity);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let client = self.client.clone();
        let filters = self.filters.clone();
        let assignment = *assignment;

        tokio::spawn(async move {
            let outcome = run_fetch(client, filters, assignment, tx).await;
            // Receiver may already be gone; nothing to do then.
            let _ = outcome_tx.send(outcome);
        });

        RepoStream { rx, outcome_rx }
    }
}

async fn run_fetch(
    client: SearchClient,
    filters: QueryFilters,
    assignment: WorkAssignment,
    tx: mpsc::Sender<RepositoryRecord>,
) -> FetchOutcome {
    let per_page = client.config().per_page as u32;
    let cap = client.config().max_records_per_query;

    let mut population_estimate = 0u64;
    let mut records_yielded = 0u64;
    let mut any_request_succeeded = false;
    let mut day_secs: Vec<f64> = Vec::with_capacity(assignment.days_span as usize);

    let truncated = |yielded: u64, population: u64, first_ok: bool| FetchOutcome {
        end: FetchEnd::Truncated {
            first_request_failed: !first_ok,
        },
        population_estimate: population,
        records_yielded: yielded,
    };

    for (day_number, date) in assignment.days().enumerate() {
        let day_timer = Instant::now();
        tracing::info!("Fetching repository data for date: {}...", date);

        let mut fetched_today = 0u32;
        let mut page = 1u32;
        let mut day_total = u64::MAX;

        loop {
            let result = match client.search_pushed_on(date, &filters, page).await {
                Ok(result) => result,
                Err(e) if e.is_fatal() => {
                    return FetchOutcome {
                        end: FetchEnd::Fatal(e),
                        population_estimate,
                        records_yielded,
                    };
                }
                Err(e) => {
                    tracing::error!("Giving up on {} page {}: {}", date, page, e);
                    return truncated(records_yielded, population_estimate, any_request_succeeded);
                }
            };

            any_request_succeeded = true;
            if page == 1 {
                population_estimate += result.total_count;
                day_total = result.total_count;
            }

            let page_len = result.items.len() as u32;
            for record in result.items {
                if tx.send(record).await.is_err() {
                    // Consumer stopped early; end the sequence quietly.
                    return truncated(records_yielded, population_estimate, any_request_succeeded);
                }
                records_yielded += 1;
            }
            fetched_today += page_len;

            // Next page only while the API still has matches to give and the
            // per-query pagination cap has not been reached.
            let more_available = page_len == per_page && (fetched_today as u64) < day_total;
            if !more_available || fetched_today >= cap {
                break;
            }
            page += 1;
        }

        day_secs.push(day_timer.elapsed().as_secs_f64());
        let elapsed: f64 = day_secs.iter().sum();
        let remaining =
            elapsed / day_secs.len() as f64 * (assignment.days_span as usize - day_secs.len()) as f64;
        tracing::info!(
            "... Fetched {} -- {}/{} days in {:.1}s, ~{:.1}s remaining",
            date,
            day_number + 1,
            assignment.days_span,
            elapsed,
            remaining
        );
    }

    FetchOutcome {
        end: FetchEnd::Completed,
        population_estimate,
        records_yielded,
    }
}
