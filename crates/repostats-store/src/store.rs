use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};

use crate::Result;
use repostats_core::{FetchStatus, LanguageStatEntry, PartialResult};

/// Durable document store for per-worker partial results, keyed by
/// worker index. Upserts replace; scans read everything.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write or overwrite the record for `partial.worker_index`. The write is
    /// last-step-atomic: either the new record fully replaces the old one or
    /// the old one is left untouched.
    async fn upsert_partial(&self, partial: &PartialResult) -> Result<()>;

    /// Read every stored partial result, ordered by worker index.
    async fn scan_partials(&self) -> Result<Vec<PartialResult>>;
}

#[derive(Clone)]
pub struct PgResultStore {
    pool: Pool<Postgres>,
}

impl PgResultStore {
    /// Create new database connection
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize database schema
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS partial_results (
                worker_index INTEGER PRIMARY KEY,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                sample_size BIGINT NOT NULL,
                population_estimate BIGINT NOT NULL,
                language_stats JSONB NOT NULL,
                completed_at TIMESTAMPTZ NOT NULL,
                status VARCHAR(20) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn upsert_partial(&self, partial: &PartialResult) -> Result<()> {
        let stats = serde_json::to_value(&partial.language_stats)?;

        sqlx::query(
            r#"
            INSERT INTO partial_results (
                worker_index, start_date, end_date, sample_size,
                population_estimate, language_stats, completed_at, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (worker_index) DO UPDATE SET
                start_date = $2,
                end_date = $3,
                sample_size = $4,
                population_estimate = $5,
                language_stats = $6,
                completed_at = $7,
                status = $8
            "#,
        )
        .bind(partial.worker_index as i32)
        .bind(partial.start_date)
        .bind(partial.end_date)
        .bind(partial.sample_size as i64)
        .bind(partial.population_estimate as i64)
        .bind(stats)
        .bind(partial.completed_at)
        .bind(partial.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn scan_partials(&self) -> Result<Vec<PartialResult>> {
        let rows = sqlx::query(
            "SELECT * FROM partial_results ORDER BY worker_index",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_partial).collect()
    }
}

fn row_to_partial(row: &sqlx::postgres::PgRow) -> Result<PartialResult> {
    let worker_index: i32 = row.get("worker_index");
    let start_date: NaiveDate = row.get("start_date");
    let end_date: NaiveDate = row.get("end_date");
    let sample_size: i64 = row.get("sample_size");
    let population_estimate: i64 = row.get("population_estimate");
    let stats_value: serde_json::Value = row.get("language_stats");
    let completed_at: DateTime<Utc> = row.get("completed_at");
    let status_str: String = row.get("status");

    let language_stats: Vec<LanguageStatEntry> = serde_json::from_value(stats_value)?;
    let status = FetchStatus::parse(&status_str).ok_or_else(|| {
        crate::Error::Decode(format!(
            "unknown status '{}' for worker {}",
            status_str, worker_index
        ))
    })?;

    Ok(PartialResult {
        worker_index: worker_index as u32,
        start_date,
        end_date,
        sample_size: sample_size as u64,
        population_estimate: population_estimate as u64,
        language_stats,
        completed_at,
        status,
    })
}
