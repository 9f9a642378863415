//! Single-order sync through `SyncController` against the in-memory store.

use std::sync::Arc;

use addrsync_reconcile::{
    AddressRecord, ExclusionSet, Field, OrderAddresses, OrderStatus, SyncDirection, SyncPolicy,
};
use addrsync_runtime::{
    MemoryOrderStore, MemoryPolicyStore, PolicyStore, SyncController, SyncError, SyncSession,
    SyncStatus,
};

fn controller(
    store: &Arc<MemoryOrderStore>,
    direction: SyncDirection,
) -> SyncController {
    let policy = SyncPolicy {
        direction,
        ..SyncPolicy::default()
    };
    SyncController::new(store.clone(), Arc::new(MemoryPolicyStore::new(policy)))
}

fn jane_partial_order() -> OrderAddresses {
    OrderAddresses::new(
        AddressRecord::empty()
            .with(Field::FirstName, "Jane")
            .with(Field::City, "Cairo")
            .with(Field::Postcode, "11511"),
        AddressRecord::empty().with(Field::Postcode, "11511"),
    )
}

#[tokio::test]
async fn empty_shipping_fields_filled_in_one_commit() {
    let store = Arc::new(MemoryOrderStore::new());
    store.insert(7, OrderStatus::Processing, jane_partial_order()).await;
    let ctl = controller(&store, SyncDirection::Both);

    let mut session = SyncSession::new();
    let outcome = ctl.sync(&mut session, 7, &ExclusionSet::new()).await.unwrap();

    assert!(outcome.is_synced());
    assert_eq!(outcome.writes.len(), 2);

    let after = store.snapshot(7).await.unwrap();
    assert_eq!(after.shipping.first_name, "Jane");
    assert_eq!(after.shipping.city, "Cairo");
    assert_eq!(after.shipping.postcode, "11511");
    assert_eq!(after.billing, jane_partial_order().billing);
    assert_eq!(store.commit_count(7).await, 1, "one commit covers all writes");
}

#[tokio::test]
async fn identical_full_records_report_nothing_to_do() {
    let full = Field::ALL
        .iter()
        .fold(AddressRecord::empty(), |r, f| r.with(*f, format!("v-{f}")));
    let store = Arc::new(MemoryOrderStore::new());
    store
        .insert(1, OrderStatus::Completed, OrderAddresses::new(full.clone(), full))
        .await;
    let ctl = controller(&store, SyncDirection::Both);

    let outcome = ctl
        .sync(&mut SyncSession::new(), 1, &ExclusionSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, SyncStatus::NothingToDo);
    assert!(!outcome.is_synced());
    assert!(outcome.writes.is_empty());
    assert_eq!(store.commit_count(1).await, 0);
}

#[tokio::test]
async fn second_call_in_session_is_suppressed() {
    let store = Arc::new(MemoryOrderStore::new());
    store
        .insert(
            3,
            OrderStatus::Pending,
            OrderAddresses::new(
                AddressRecord::empty(),
                AddressRecord::empty().with(Field::City, "Giza"),
            ),
        )
        .await;
    let ctl = controller(&store, SyncDirection::ShippingToBilling);

    let mut session = SyncSession::new();
    let first = ctl.sync(&mut session, 3, &ExclusionSet::new()).await.unwrap();
    assert!(first.is_synced());
    assert_eq!(store.snapshot(3).await.unwrap().billing.city, "Giza");

    // Make the order eligible again; the session must still suppress it.
    store
        .insert(
            3,
            OrderStatus::Pending,
            OrderAddresses::new(
                AddressRecord::empty(),
                AddressRecord::empty().with(Field::Country, "EG"),
            ),
        )
        .await;
    let second = ctl.sync(&mut session, 3, &ExclusionSet::new()).await.unwrap();
    assert_eq!(second.status, SyncStatus::AlreadyProcessed);
    assert_eq!(store.snapshot(3).await.unwrap().billing.country, "");
    assert_eq!(store.commit_count(3).await, 1);
}

#[tokio::test]
async fn rerun_in_fresh_session_is_idempotent() {
    let store = Arc::new(MemoryOrderStore::new());
    store.insert(7, OrderStatus::Processing, jane_partial_order()).await;
    let ctl = controller(&store, SyncDirection::Both);

    let first = ctl
        .sync(&mut SyncSession::new(), 7, &ExclusionSet::new())
        .await
        .unwrap();
    assert!(first.is_synced());

    let second = ctl
        .sync(&mut SyncSession::new(), 7, &ExclusionSet::new())
        .await
        .unwrap();
    assert_eq!(second.status, SyncStatus::NothingToDo);
    assert_eq!(store.commit_count(7).await, 1);
}

#[tokio::test]
async fn missing_order_is_not_found_and_still_marked() {
    let store = Arc::new(MemoryOrderStore::new());
    let ctl = controller(&store, SyncDirection::Both);

    let mut session = SyncSession::new();
    let outcome = ctl.sync(&mut session, 404, &ExclusionSet::new()).await.unwrap();
    assert_eq!(outcome.status, SyncStatus::NotFound);
    assert_eq!(outcome.message(), "Order not found");
    assert!(session.is_processed(404));
}

#[tokio::test]
async fn excluded_fields_survive_sync() {
    let store = Arc::new(MemoryOrderStore::new());
    store.insert(7, OrderStatus::Processing, jane_partial_order()).await;
    let ctl = controller(&store, SyncDirection::Both);

    let excluded = ExclusionSet::parse(["shipping_city"]).unwrap();
    let outcome = ctl
        .sync(&mut SyncSession::new(), 7, &excluded)
        .await
        .unwrap();

    assert!(outcome.is_synced());
    let after = store.snapshot(7).await.unwrap();
    assert_eq!(after.shipping.first_name, "Jane");
    assert_eq!(after.shipping.city, "", "excluded field must stay untouched");
}

#[tokio::test]
async fn persist_failure_is_a_distinct_error() {
    let store = Arc::new(MemoryOrderStore::new());
    store.insert(7, OrderStatus::Processing, jane_partial_order()).await;
    store.fail_persist_for(7).await;
    let ctl = controller(&store, SyncDirection::Both);

    let err = ctl
        .sync(&mut SyncSession::new(), 7, &ExclusionSet::new())
        .await
        .unwrap_err();

    match err {
        SyncError::StorageWrite {
            order_id,
            lost_writes,
            ..
        } => {
            assert_eq!(order_id, 7);
            assert_eq!(lost_writes.len(), 2);
        }
        other => panic!("expected StorageWrite, got {other:?}"),
    }
    assert_eq!(store.snapshot(7).await.unwrap().shipping.city, "");
}

#[tokio::test]
async fn policy_is_read_fresh_on_every_call() {
    let store = Arc::new(MemoryOrderStore::new());
    store
        .insert(
            1,
            OrderStatus::Processing,
            OrderAddresses::new(
                AddressRecord::empty().with(Field::City, "Cairo"),
                AddressRecord::empty(),
            ),
        )
        .await;
    let policy = Arc::new(MemoryPolicyStore::new(SyncPolicy {
        direction: SyncDirection::ShippingToBilling,
        ..SyncPolicy::default()
    }));
    let ctl = SyncController::new(store.clone(), policy.clone());

    let first = ctl
        .sync(&mut SyncSession::new(), 1, &ExclusionSet::new())
        .await
        .unwrap();
    assert_eq!(first.status, SyncStatus::NothingToDo);

    policy
        .set_policy(SyncPolicy {
            direction: SyncDirection::BillingToShipping,
            ..SyncPolicy::default()
        })
        .await
        .unwrap();

    let second = ctl
        .sync(&mut SyncSession::new(), 1, &ExclusionSet::new())
        .await
        .unwrap();
    assert!(second.is_synced());
    assert_eq!(store.snapshot(1).await.unwrap().shipping.city, "Cairo");
}
