use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;

use crate::queue::{Delivery, Receipt, WorkQueue};
use crate::Result;
use repostats_core::WorkAssignment;

/// Postgres-backed work queue. Claims use `FOR UPDATE SKIP LOCKED` so
/// concurrent workers never grab the same message; leases that go stale
/// (worker crashed mid-run) are requeued, giving at-least-once delivery.
#[derive(Clone)]
pub struct PgWorkQueue {
    pool: Pool<Postgres>,
}

impl PgWorkQueue {
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
            CREATE TABLE IF NOT EXISTS work_assignments (
                id BIGSERIAL PRIMARY KEY,
                payload JSONB NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                published_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                leased_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_work_assignments_status \
             ON work_assignments(status)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Return messages whose lease has expired to the pending state.
    pub async fn requeue_stale(&self, lease: Duration) -> Result<u64> {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(lease)
                .map_err(|e| anyhow::anyhow!("lease duration out of range: {}", e))?;

        let result = sqlx::query(
            r#"
            UPDATE work_assignments
            SET status = 'pending', leased_at = NULL
            WHERE status = 'leased' AND leased_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let requeued = result.rows_affected();
        if requeued > 0 {
            tracing::warn!("Requeued {} stale work assignments", requeued);
        }
        Ok(requeued)
    }
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    async fn publish(&self, assignment: &WorkAssignment) -> Result<()> {
        let payload = serde_json::to_value(assignment)?;

        sqlx::query("INSERT INTO work_assignments (payload) VALUES ($1)")
            .bind(payload)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>> {
        let row = sqlx::query(
            r#"
            UPDATE work_assignments
            SET status = 'leased', leased_at = NOW()
            WHERE id = (
                SELECT id FROM work_assignments
                WHERE status = 'pending'
                ORDER BY id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, payload
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.get("id");
        let payload: serde_json::Value = row.get("payload");
        let assignment: WorkAssignment = serde_json::from_value(payload)?;

        Ok(Some(Delivery {
            assignment,
            receipt: Receipt(id),
        }))
    }

    async fn ack(&self, receipt: Receipt) -> Result<()> {
        sqlx::query("DELETE FROM work_assignments WHERE id = $1")
            .bind(receipt.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn nack(&self, receipt: Receipt) -> Result<()> {
        sqlx::query(
            "UPDATE work_assignments SET status = 'pending', leased_at = NULL WHERE id = $1",
        )
        .bind(receipt.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
