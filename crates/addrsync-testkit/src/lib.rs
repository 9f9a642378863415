//! Fixtures and harness for cross-crate address sync scenarios.

use std::fs;
use std::sync::Arc;

use addrsync_config::AddressSyncConfig;
use addrsync_reconcile::{AddressRecord, Field, OrderAddresses, OrderId, OrderStatus};
use addrsync_runtime::{
    BatchDriver, MemoryOrderStore, MemoryPolicyStore, StoredOrder, SyncController,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One order as written in a JSON fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureOrder {
    pub order_id: OrderId,
    pub status: OrderStatus,
    #[serde(default)]
    pub billing: AddressRecord,
    #[serde(default)]
    pub shipping: AddressRecord,
}

impl FixtureOrder {
    fn into_stored(self) -> (OrderId, StoredOrder) {
        (
            self.order_id,
            StoredOrder {
                status: self.status,
                addresses: OrderAddresses::new(self.billing, self.shipping),
            },
        )
    }
}

pub fn load_orders_json(path: &str) -> Result<Vec<FixtureOrder>> {
    let s = fs::read_to_string(path).with_context(|| format!("read orders fixture: {path}"))?;
    let orders: Vec<FixtureOrder> = serde_json::from_str(&s).context("parse orders fixture json")?;

    let mut seen = std::collections::BTreeSet::new();
    for o in &orders {
        if !seen.insert(o.order_id) {
            anyhow::bail!("duplicate order_id {} in fixture", o.order_id);
        }
    }
    Ok(orders)
}

/// Record with every one of the ten fields set to `"{prefix}-{field}"`.
pub fn full_record(prefix: &str) -> AddressRecord {
    Field::ALL
        .iter()
        .fold(AddressRecord::empty(), |r, f| r.with(*f, format!("{prefix}-{f}")))
}

/// Record with only `fields` set, using the same value scheme as [`full_record`].
pub fn partial_record(prefix: &str, fields: &[Field]) -> AddressRecord {
    fields
        .iter()
        .fold(AddressRecord::empty(), |r, f| r.with(*f, format!("{prefix}-{f}")))
}

/// In-memory stores plus a driver, wired with a policy from layered YAML.
pub struct Harness {
    pub orders: Arc<MemoryOrderStore>,
    pub policy: Arc<MemoryPolicyStore>,
    pub driver: BatchDriver,
    pub settings: AddressSyncConfig,
}

impl Harness {
    pub fn new(settings: AddressSyncConfig, orders: Vec<FixtureOrder>) -> Self {
        let orders = Arc::new(MemoryOrderStore::with_orders(
            orders.into_iter().map(FixtureOrder::into_stored),
        ));
        let policy = Arc::new(MemoryPolicyStore::new(settings.policy.clone()));
        let driver = BatchDriver::new(SyncController::new(orders.clone(), policy.clone()));
        Self {
            orders,
            policy,
            driver,
            settings,
        }
    }

    pub fn from_yaml(yaml_docs: &[&str], orders: Vec<FixtureOrder>) -> Result<Self> {
        let loaded = addrsync_config::load_layered_yaml_from_strings(yaml_docs)?;
        Ok(Self::new(loaded.settings, orders))
    }

    pub fn controller(&self) -> &SyncController {
        self.driver.controller()
    }
}
