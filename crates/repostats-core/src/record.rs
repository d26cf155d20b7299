use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One repository as returned by the search API.
///
/// Records are only ever aggregated; they are never persisted individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Unique `owner/name` identifier.
    pub id: String,
    /// Primary language reported by the API, absent for e.g. empty repos.
    pub primary_language: Option<String>,
    /// Last push time, falling back to creation time when the API omits it.
    pub pushed_at: Option<DateTime<Utc>>,
    pub star_count: u32,
    /// Remaining response fields, kept opaque.
    #[serde(default)]
    pub raw_metadata: Map<String, Value>,
}

impl RepositoryRecord {
    pub fn new(id: impl Into<String>, primary_language: Option<String>) -> Self {
        Self {
            id: id.into(),
            primary_language,
            pushed_at: None,
            star_count: 0,
            raw_metadata: Map::new(),
        }
    }
}
