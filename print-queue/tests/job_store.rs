//! Job store guarantees under concurrent callers

mod common;

use common::{create_order, send_order, test_db};
use print_queue::PrintJobStatus;
use print_queue::db::repository::print_job;
use std::collections::HashSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_have_one_winner() {
    let (_dir, db) = test_db().await;
    let order_id = create_order(&db.pool).await;
    let job = send_order(&db.pool, order_id).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let pool = db.pool.clone();
        let id = job.id;
        handles.push(tokio::spawn(async move { print_job::claim(&pool, id).await }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let stored = print_job::find_by_id(&db.pool, job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PrintJobStatus::Printing);
    assert!(stored.started_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_over_many_jobs_partition_them() {
    let (_dir, db) = test_db().await;
    let mut ids = Vec::new();
    for _ in 0..10 {
        let order_id = create_order(&db.pool).await;
        ids.push(send_order(&db.pool, order_id).await.id);
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let pool = db.pool.clone();
        let ids = ids.clone();
        handles.push(tokio::spawn(async move {
            let mut won = Vec::new();
            for id in ids {
                if print_job::claim(&pool, id).await.unwrap().is_some() {
                    won.push(id);
                }
            }
            won
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "job {id} claimed twice");
        }
    }
    assert_eq!(seen.len(), ids.len());
}

#[tokio::test]
async fn test_attempts_grow_by_one_until_failed() {
    let (_dir, db) = test_db().await;
    let order_id = create_order(&db.pool).await;
    let job = send_order(&db.pool, order_id).await;

    let mut last = 0;
    for round in 1..=3 {
        print_job::claim(&db.pool, job.id).await.unwrap().unwrap();
        let updated = print_job::record_failure(&db.pool, job.id, &format!("fail {round}"), None)
            .await
            .unwrap();
        assert_eq!(updated.attempts, last + 1);
        assert!(updated.attempts <= updated.max_attempts);
        last = updated.attempts;
    }

    let failed = print_job::find_by_id(&db.pool, job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PrintJobStatus::Failed);
    assert_eq!(failed.attempts, failed.max_attempts);
    assert!(failed.failed_at.is_some());

    // stays failed: nothing can claim it
    assert!(print_job::claim(&db.pool, job.id).await.unwrap().is_none());
    assert!(print_job::list_pending(&db.pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_printed_job_ignores_every_mutation() {
    let (_dir, db) = test_db().await;
    let order_id = create_order(&db.pool).await;
    let job = send_order(&db.pool, order_id).await;

    print_job::claim(&db.pool, job.id).await.unwrap().unwrap();
    let printed = print_job::mark_printed(&db.pool, job.id).await.unwrap();

    assert!(print_job::claim(&db.pool, job.id).await.unwrap().is_none());
    assert!(
        print_job::record_failure(&db.pool, job.id, "late", None)
            .await
            .is_err()
    );
    assert_eq!(print_job::mark_printed(&db.pool, job.id).await.unwrap(), printed);
    assert_eq!(print_job::retry(&db.pool, job.id).await.unwrap(), printed);

    let stored = print_job::find_by_id(&db.pool, job.id).await.unwrap().unwrap();
    assert_eq!(stored, printed);
}
