//! Postgres-backed queue tests. Ignored by default; run with a live database:
//! `DATABASE_URL=postgres://... cargo test -p repostats-queue -- --ignored`

use chrono::NaiveDate;
use std::time::Duration;

use repostats_core::partition_from;
use repostats_queue::{PgWorkQueue, WorkQueue};

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for Postgres tests")
}

#[tokio::test]
#[ignore]
async fn test_pg_publish_receive_ack() {
    let queue = PgWorkQueue::new(&database_url()).await.unwrap();
    queue.init_schema().await.unwrap();

    let anchor = NaiveDate::from_ymd_opt(2023, 5, 30).unwrap();
    let assignment = partition_from(anchor, 7, 901).unwrap();
    queue.publish(&assignment).await.unwrap();

    // Drain until our assignment comes around; other tests may share the table.
    loop {
        let Some(delivery) = queue.receive().await.unwrap() else {
            panic!("published assignment never delivered");
        };
        let found = delivery.assignment.worker_index == 901;
        queue.ack(delivery.receipt).await.unwrap();
        if found {
            break;
        }
    }
}

#[tokio::test]
#[ignore]
async fn test_pg_requeue_stale_returns_unacked_messages() {
    let queue = PgWorkQueue::new(&database_url()).await.unwrap();
    queue.init_schema().await.unwrap();

    let anchor = NaiveDate::from_ymd_opt(2023, 5, 30).unwrap();
    let assignment = partition_from(anchor, 7, 902).unwrap();
    queue.publish(&assignment).await.unwrap();

    // Receive without acking, then expire the lease immediately.
    loop {
        let Some(delivery) = queue.receive().await.unwrap() else {
            break;
        };
        if delivery.assignment.worker_index == 902 {
            break;
        }
        queue.ack(delivery.receipt).await.unwrap();
    }
    queue.requeue_stale(Duration::from_secs(0)).await.unwrap();

    loop {
        let Some(delivery) = queue.receive().await.unwrap() else {
            panic!("stale message was not requeued");
        };
        let found = delivery.assignment.worker_index == 902;
        queue.ack(delivery.receipt).await.unwrap();
        if found {
            break;
        }
    }
}
