//! Bulk sync pagination through `BatchDriver`.

use std::sync::Arc;
use std::time::Duration;

use addrsync_reconcile::{AddressRecord, Field, OrderAddresses, OrderStatus, SyncPolicy};
use addrsync_runtime::{
    BatchDriver, MemoryOrderStore, MemoryPolicyStore, SyncController, SyncSession,
};

fn needs_fill() -> OrderAddresses {
    OrderAddresses::new(
        AddressRecord::empty().with(Field::City, "Cairo"),
        AddressRecord::empty(),
    )
}

fn already_aligned() -> OrderAddresses {
    let rec = AddressRecord::empty().with(Field::City, "Alexandria");
    OrderAddresses::new(rec.clone(), rec)
}

fn driver(store: &Arc<MemoryOrderStore>) -> BatchDriver {
    let policy = Arc::new(MemoryPolicyStore::new(SyncPolicy::default()));
    BatchDriver::new(SyncController::new(store.clone(), policy))
}

/// 25 active orders, 17 needing a write.
async fn seed_25(store: &MemoryOrderStore) {
    for id in 1..=25 {
        let status = match id % 4 {
            0 => OrderStatus::Processing,
            1 => OrderStatus::Completed,
            2 => OrderStatus::Pending,
            _ => OrderStatus::OnHold,
        };
        let addrs = if id % 3 == 0 { already_aligned() } else { needs_fill() };
        store.insert(id, status, addrs).await;
    }
}

#[tokio::test]
async fn three_pages_cover_25_orders() {
    let store = Arc::new(MemoryOrderStore::new());
    seed_25(&store).await;
    let drv = driver(&store);

    let mut offsets = Vec::new();
    let mut total_synced = 0u32;
    let mut offset = 0u64;
    loop {
        offsets.push(offset);
        let r = drv.run_batch(&mut SyncSession::new(), offset, 10).await.unwrap();
        total_synced += r.synced_count;
        assert_eq!(r.next_offset, offset + 10);
        if !r.has_more {
            break;
        }
        offset = r.next_offset;
    }

    assert_eq!(offsets, vec![0, 10, 20]);
    // ids divisible by 3 within 1..=25: 8 aligned, 17 needing a write.
    assert_eq!(total_synced, 17);
}

#[tokio::test]
async fn inactive_orders_are_skipped_and_may_cause_trailing_empty_page() {
    let store = Arc::new(MemoryOrderStore::new());
    seed_25(&store).await;
    for id in 100..110 {
        store.insert(id, OrderStatus::Cancelled, needs_fill()).await;
    }
    let drv = driver(&store);

    // Total count is 35, so page 20 still claims more.
    let third = drv.run_batch(&mut SyncSession::new(), 20, 10).await.unwrap();
    assert_eq!(third.fetched, 5);
    assert!(third.has_more);

    let fourth = drv.run_batch(&mut SyncSession::new(), 30, 10).await.unwrap();
    assert_eq!(fourth.fetched, 0);
    assert!(!fourth.has_more, "empty page terminates the run");

    let cancelled = store.snapshot(100).await.unwrap();
    assert_eq!(cancelled.shipping.city, "", "cancelled orders are never synced");
}

#[tokio::test]
async fn one_failing_order_does_not_abort_the_batch() {
    let store = Arc::new(MemoryOrderStore::new());
    for id in 1..=5 {
        store.insert(id, OrderStatus::Processing, needs_fill()).await;
    }
    store.fail_persist_for(3).await;
    let drv = driver(&store);

    let r = drv.run_batch(&mut SyncSession::new(), 0, 10).await.unwrap();
    assert_eq!(r.synced_count, 4);
    assert_eq!(r.failed_count, 1);
    assert!(!r.has_more);
    assert_eq!(store.snapshot(5).await.unwrap().shipping.city, "Cairo");
}

#[tokio::test]
async fn run_bulk_accumulates_across_batches() {
    let store = Arc::new(MemoryOrderStore::new());
    seed_25(&store).await;
    let drv = driver(&store);

    let mut seen = Vec::new();
    let summary = drv
        .run_bulk(10, Duration::ZERO, |b| seen.push(b.synced_count))
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.synced, 17);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.final_offset, 30);
    assert_eq!(seen.iter().map(|n| u64::from(*n)).sum::<u64>(), 17);

    // A second full run finds nothing left to fill.
    let again = drv.run_bulk(10, Duration::ZERO, |_| {}).await.unwrap();
    assert_eq!(again.synced, 0);
}

#[tokio::test(start_paused = true)]
async fn run_bulk_sleeps_between_batches_only() {
    let store = Arc::new(MemoryOrderStore::new());
    seed_25(&store).await;
    let drv = driver(&store);

    let started = tokio::time::Instant::now();
    let summary = drv
        .run_bulk(10, Duration::from_secs(1), |_| {})
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3));
}

#[tokio::test]
async fn empty_collection_finishes_in_one_batch() {
    let store = Arc::new(MemoryOrderStore::new());
    let drv = driver(&store);

    let summary = drv.run_bulk(10, Duration::ZERO, |_| {}).await.unwrap();
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.synced, 0);
}
