use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::aggregate::{sort_stats, LanguageStatEntry};
use crate::{Error, Result};

/// Outcome of one worker's fetch pass over its date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    /// The fetch ran to natural completion. Zero matches is still complete.
    Complete,
    /// The fetch stopped early but the records yielded so far are valid.
    Partial,
    /// Nothing was yielded and the fetch could not get off the ground.
    Failed,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Complete => "COMPLETE",
            FetchStatus::Partial => "PARTIAL",
            FetchStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "COMPLETE" => Some(FetchStatus::Complete),
            "PARTIAL" => Some(FetchStatus::Partial),
            "FAILED" => Some(FetchStatus::Failed),
            _ => None,
        }
    }
}

/// One worker's language-statistics summary for its assigned date range.
///
/// Stored keyed by `worker_index`; a re-run with the same index replaces the
/// previous record rather than appending to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    pub worker_index: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Repositories actually fetched and aggregated.
    pub sample_size: u64,
    /// API-reported total matches, which may exceed `sample_size` because of
    /// the search pagination cap. Downstream reporting needs both numbers.
    pub population_estimate: u64,
    pub language_stats: Vec<LanguageStatEntry>,
    pub completed_at: DateTime<Utc>,
    pub status: FetchStatus,
}

/// The fully merged dataset across all workers, ready for visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub total_sample_size: u64,
    pub total_population_estimate: u64,
    pub merged_language_stats: Vec<LanguageStatEntry>,
}

/// Merge every contributing partial result into one aggregate.
///
/// A pure, repeatable reduction: the same inputs always produce a
/// bit-identical aggregate, in any order. PARTIAL results contribute the data
/// they did yield; FAILED results carry empty stats and contribute nothing.
pub fn merge(partials: &[PartialResult]) -> Result<AggregatedResult> {
    if partials.is_empty() {
        return Err(Error::NoDataAvailable);
    }

    let mut counts: HashMap<&str, u64> = HashMap::new();
    let mut total_sample_size = 0u64;
    let mut total_population_estimate = 0u64;
    let mut min_date = partials[0].start_date;
    let mut max_date = partials[0].end_date;

    for partial in partials {
        min_date = min_date.min(partial.start_date);
        max_date = max_date.max(partial.end_date);
        total_sample_size += partial.sample_size;
        total_population_estimate += partial.population_estimate;

        for entry in &partial.language_stats {
            *counts.entry(entry.language.as_str()).or_insert(0) += entry.repository_count;
        }
    }

    let mut merged_language_stats: Vec<LanguageStatEntry> = counts
        .into_iter()
        .map(|(language, repository_count)| LanguageStatEntry {
            language: language.to_string(),
            repository_count,
        })
        .collect();
    sort_stats(&mut merged_language_stats);

    Ok(AggregatedResult {
        min_date,
        max_date,
        total_sample_size,
        total_population_estimate,
        merged_language_stats,
    })
}
