use std::sync::Arc;

use crate::Result;
use repostats_core::{partition_from, WorkAssignment};
use repostats_queue::WorkQueue;

/// Producer side of the pipeline: computes one date-range assignment per
/// worker index and publishes each as an independent queue message.
pub struct Dispatcher {
    queue: Arc<dyn WorkQueue>,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        Self { queue }
    }

    /// Publish `worker_count` assignments of `num_days` each, anchored at
    /// today. Assignments are self-contained; workers may pick them up in any
    /// order and at any time.
    pub async fn dispatch(&self, num_days: i64, worker_count: u32) -> Result<Vec<WorkAssignment>> {
        self.dispatch_from(chrono::Utc::now().date_naive(), num_days, worker_count)
            .await
    }

    /// Same as [`dispatch`](Self::dispatch) with an explicit anchor date.
    pub async fn dispatch_from(
        &self,
        today: chrono::NaiveDate,
        num_days: i64,
        worker_count: u32,
    ) -> Result<Vec<WorkAssignment>> {
        if worker_count == 0 {
            return Err(repostats_core::Error::InvalidArgument(
                "worker_count must be positive".to_string(),
            )
            .into());
        }

        let mut assignments = Vec::with_capacity(worker_count as usize);
        for index in 0..worker_count {
            let assignment = partition_from(today, num_days, index)?;
            self.queue.publish(&assignment).await?;
            tracing::info!(
                "Dispatched worker {} for [{}, {})",
                index,
                assignment.start_date,
                assignment.end_date
            );
            assignments.push(assignment);
        }

        Ok(assignments)
    }
}
