//! Automatic trigger helpers and completeness statistics.

use std::collections::BTreeMap;
use std::sync::Arc;

use addrsync_reconcile::{AddressRecord, Field, OrderAddresses, OrderStatus, SyncPolicy, REQUIRED_FIELDS};
use addrsync_runtime::{
    collect_address_statistics, MemoryOrderStore, MemoryPolicyStore, SyncController, SyncSession,
    SyncStatus,
};

fn partial_order() -> OrderAddresses {
    OrderAddresses::new(
        AddressRecord::empty()
            .with(Field::City, "Cairo")
            .with(Field::Postcode, "11511"),
        AddressRecord::empty(),
    )
}

#[tokio::test]
async fn disabled_policy_blocks_triggers_but_not_manual_sync() {
    let store = Arc::new(MemoryOrderStore::new());
    store.insert(1, OrderStatus::Processing, partial_order()).await;
    let policy = SyncPolicy {
        auto_sync_enabled: false,
        ..SyncPolicy::default()
    };
    let ctl = SyncController::new(store.clone(), Arc::new(MemoryPolicyStore::new(policy)));

    let mut session = SyncSession::new();
    let created = ctl.on_order_created(&mut session, 1).await.unwrap();
    assert_eq!(created.status, SyncStatus::PolicyDisabled);
    assert!(!session.is_processed(1), "disabled trigger does not consume the session slot");
    assert_eq!(store.snapshot(1).await.unwrap().shipping.city, "");

    let manual = ctl
        .sync(&mut session, 1, &addrsync_reconcile::ExclusionSet::new())
        .await
        .unwrap();
    assert!(manual.is_synced());
}

#[tokio::test]
async fn order_saved_treats_submitted_fields_as_authoritative() {
    let store = Arc::new(MemoryOrderStore::new());
    store.insert(1, OrderStatus::Processing, partial_order()).await;
    let ctl = SyncController::new(
        store.clone(),
        Arc::new(MemoryPolicyStore::new(SyncPolicy::default())),
    );

    // The operator just typed a shipping city that has not landed yet.
    let mut form = BTreeMap::new();
    form.insert("_shipping_city".to_string(), "Luxor".to_string());
    form.insert("_shipping_postcode".to_string(), String::new());

    let outcome = ctl.on_order_saved(&mut SyncSession::new(), 1, &form).await.unwrap();
    assert!(outcome.is_synced());

    let after = store.snapshot(1).await.unwrap();
    assert_eq!(after.shipping.city, "", "submitted field is never overwritten");
    assert_eq!(after.shipping.postcode, "11511", "empty submission does not exclude");
}

#[tokio::test]
async fn statistics_count_incomplete_active_orders() {
    let complete = REQUIRED_FIELDS
        .iter()
        .fold(AddressRecord::empty(), |r, f| r.with(*f, "x"));

    let store = MemoryOrderStore::new();
    store
        .insert(1, OrderStatus::Processing, OrderAddresses::new(complete.clone(), complete.clone()))
        .await;
    store
        .insert(2, OrderStatus::Completed, OrderAddresses::new(complete.clone(), AddressRecord::empty()))
        .await;
    store
        .insert(3, OrderStatus::OnHold, OrderAddresses::new(AddressRecord::empty(), AddressRecord::empty()))
        .await;
    store
        .insert(4, OrderStatus::Refunded, OrderAddresses::new(AddressRecord::empty(), AddressRecord::empty()))
        .await;

    let stats = collect_address_statistics(&store, 2).await.unwrap();
    assert_eq!(stats.active_orders, 3);
    assert_eq!(stats.incomplete_billing_orders, 1);
    assert_eq!(stats.incomplete_shipping_orders, 2);
}
