use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::record::RepositoryRecord;

/// Bucket for records whose primary language the API did not report.
/// Counting them keeps sample accounting consistent with the population.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStatEntry {
    pub language: String,
    pub repository_count: u64,
}

/// In-memory per-language counter over a stream of repository records.
#[derive(Debug, Default)]
pub struct LanguageAggregator {
    counts: HashMap<String, u64>,
    records_seen: u64,
}

impl LanguageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: &RepositoryRecord) {
        let language = record
            .primary_language
            .as_deref()
            .unwrap_or(UNKNOWN_LANGUAGE);
        *self.counts.entry(language.to_string()).or_insert(0) += 1;
        self.records_seen += 1;
    }

    pub fn observe_all<'a>(&mut self, records: impl IntoIterator<Item = &'a RepositoryRecord>) {
        for record in records {
            self.observe(record);
        }
    }

    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    /// Consume the aggregator and return the sorted statistics.
    pub fn into_stats(self) -> Vec<LanguageStatEntry> {
        let mut stats: Vec<LanguageStatEntry> = self
            .counts
            .into_iter()
            .map(|(language, repository_count)| LanguageStatEntry {
                language,
                repository_count,
            })
            .collect();
        sort_stats(&mut stats);
        stats
    }
}

/// Descending by count, ties ascending by language name. Keeping the order
/// deterministic makes merges and UI snapshots reproducible.
pub(crate) fn sort_stats(stats: &mut [LanguageStatEntry]) {
    stats.sort_by(|a, b| {
        b.repository_count
            .cmp(&a.repository_count)
            .then_with(|| a.language.cmp(&b.language))
    });
}
