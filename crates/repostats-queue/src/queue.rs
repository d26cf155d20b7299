use async_trait::async_trait;

use crate::Result;
use repostats_core::WorkAssignment;

/// Identifies one delivered message for ack/nack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt(pub i64);

/// One received work item. The assignment is self-contained, so consumers
/// never need ordering or coordination between deliveries.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub assignment: WorkAssignment,
    pub receipt: Receipt,
}

/// Durable work queue with at-least-once delivery.
///
/// A message that is received but never acked comes back; consumers must
/// tolerate seeing the same assignment twice. That is safe here because
/// result persistence is overwrite-idempotent by worker index.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn publish(&self, assignment: &WorkAssignment) -> Result<()>;

    /// Claim the next pending assignment, or `None` when the queue is empty.
    async fn receive(&self) -> Result<Option<Delivery>>;

    /// Remove a processed message for good.
    async fn ack(&self, receipt: Receipt) -> Result<()>;

    /// Return a message to the queue for redelivery.
    async fn nack(&self, receipt: Receipt) -> Result<()>;
}
