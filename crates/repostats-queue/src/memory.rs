use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::queue::{Delivery, Receipt, WorkQueue};
use crate::Result;
use repostats_core::WorkAssignment;

#[derive(Default)]
struct Inner {
    next_id: i64,
    pending: VecDeque<(i64, WorkAssignment)>,
    leased: HashMap<i64, WorkAssignment>,
}

/// In-memory work queue for tests and the synchronous CLI harness. Keeps the
/// same receive/ack/nack contract as the durable queue, minus durability.
#[derive(Clone, Default)]
pub struct MemoryWorkQueue {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn publish(&self, assignment: &WorkAssignment) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.pending.push_back((id, *assignment));
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>> {
        let mut inner = self.inner.lock().await;
        let Some((id, assignment)) = inner.pending.pop_front() else {
            return Ok(None);
        };
        inner.leased.insert(id, assignment);
        Ok(Some(Delivery {
            assignment,
            receipt: Receipt(id),
        }))
    }

    async fn ack(&self, receipt: Receipt) -> Result<()> {
        self.inner.lock().await.leased.remove(&receipt.0);
        Ok(())
    }

    async fn nack(&self, receipt: Receipt) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(assignment) = inner.leased.remove(&receipt.0) {
            inner.pending.push_back((receipt.0, assignment));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repostats_core::partition_from;
    use chrono::NaiveDate;

    fn assignment(index: u32) -> WorkAssignment {
        let anchor = NaiveDate::from_ymd_opt(2023, 5, 30).unwrap();
        partition_from(anchor, 7, index).unwrap()
    }

    #[tokio::test]
    async fn test_publish_receive_ack() {
        let queue = MemoryWorkQueue::new();
        queue.publish(&assignment(0)).await.unwrap();
        queue.publish(&assignment(1)).await.unwrap();

        let first = queue.receive().await.unwrap().unwrap();
        assert_eq!(first.assignment.worker_index, 0);
        queue.ack(first.receipt).await.unwrap();

        let second = queue.receive().await.unwrap().unwrap();
        assert_eq!(second.assignment.worker_index, 1);
        queue.ack(second.receipt).await.unwrap();

        assert!(queue.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nack_redelivers() {
        let queue = MemoryWorkQueue::new();
        queue.publish(&assignment(0)).await.unwrap();

        let delivery = queue.receive().await.unwrap().unwrap();
        queue.nack(delivery.receipt).await.unwrap();

        // At-least-once: the same assignment comes around again.
        let redelivered = queue.receive().await.unwrap().unwrap();
        assert_eq!(redelivered.assignment, delivery.assignment);
    }
}
