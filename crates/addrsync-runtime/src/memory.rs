//! In-memory storage backends.
//!
//! Used by tests, by the daemon when no database is configured, and by any
//! host that keeps orders in process. Staged writes are held per order and
//! applied to the committed snapshot in one step on `persist`. A staged write
//! only lands if its target field is still empty at that point.

use std::collections::{BTreeMap, BTreeSet};

use addrsync_reconcile::{
    AddressRecord, Field, FieldWrite, OrderAddresses, OrderId, OrderStatus, Role, SyncPolicy,
};
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::store::{OrderStore, PolicyStore, StoreError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredOrder {
    pub status: OrderStatus,
    pub addresses: OrderAddresses,
}

#[derive(Default)]
struct Inner {
    orders: BTreeMap<OrderId, StoredOrder>,
    staged: BTreeMap<OrderId, Vec<FieldWrite>>,
    commits: BTreeMap<OrderId, u32>,
    failing: BTreeSet<OrderId>,
}

#[derive(Default)]
pub struct MemoryOrderStore {
    inner: Mutex<Inner>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with orders.
    pub fn with_orders<I>(orders: I) -> Self
    where
        I: IntoIterator<Item = (OrderId, StoredOrder)>,
    {
        Self {
            inner: Mutex::new(Inner {
                orders: orders.into_iter().collect(),
                ..Inner::default()
            }),
        }
    }

    pub async fn insert(&self, order_id: OrderId, status: OrderStatus, addresses: OrderAddresses) {
        let mut g = self.inner.lock().await;
        g.orders.insert(order_id, StoredOrder { status, addresses });
    }

    /// Committed snapshot of an order's addresses.
    pub async fn snapshot(&self, order_id: OrderId) -> Option<OrderAddresses> {
        let g = self.inner.lock().await;
        g.orders.get(&order_id).map(|o| o.addresses.clone())
    }

    /// Number of successful commits that carried at least one write.
    pub async fn commit_count(&self, order_id: OrderId) -> u32 {
        let g = self.inner.lock().await;
        g.commits.get(&order_id).copied().unwrap_or(0)
    }

    pub async fn staged_count(&self, order_id: OrderId) -> usize {
        let g = self.inner.lock().await;
        g.staged.get(&order_id).map(Vec::len).unwrap_or(0)
    }

    /// Make every subsequent `persist` for `order_id` fail.
    pub async fn fail_persist_for(&self, order_id: OrderId) {
        let mut g = self.inner.lock().await;
        g.failing.insert(order_id);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn exists(&self, order_id: OrderId) -> Result<bool, StoreError> {
        let g = self.inner.lock().await;
        Ok(g.orders.contains_key(&order_id))
    }

    async fn get(&self, order_id: OrderId, role: Role) -> Result<Option<AddressRecord>, StoreError> {
        let g = self.inner.lock().await;
        Ok(g.orders
            .get(&order_id)
            .map(|o| o.addresses.record(role).clone()))
    }

    async fn set(
        &self,
        order_id: OrderId,
        role: Role,
        field: Field,
        value: String,
    ) -> Result<(), StoreError> {
        let mut g = self.inner.lock().await;
        if !g.orders.contains_key(&order_id) {
            return Err(StoreError::NotFound { order_id });
        }
        g.staged
            .entry(order_id)
            .or_default()
            .push(FieldWrite::new(role, field, value));
        Ok(())
    }

    async fn persist(&self, order_id: OrderId) -> Result<(), StoreError> {
        let mut g = self.inner.lock().await;
        let writes = g.staged.remove(&order_id).unwrap_or_default();
        if writes.is_empty() {
            return Ok(());
        }

        if g.failing.contains(&order_id) {
            return Err(StoreError::Write {
                order_id,
                message: "commit rejected".to_string(),
            });
        }

        let order = g
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::NotFound { order_id })?;
        // Fill-only at commit time: a field filled since the writes were
        // staged keeps its value.
        let mut applied = 0usize;
        for w in writes {
            let record = order.addresses.record_mut(w.role);
            if record.is_empty_field(w.field) {
                record.set(w.field, w.value);
                applied += 1;
            }
        }
        if applied > 0 {
            *g.commits.entry(order_id).or_insert(0) += 1;
        }
        Ok(())
    }

    async fn discard(&self, order_id: OrderId) {
        let mut g = self.inner.lock().await;
        g.staged.remove(&order_id);
    }

    async fn query(
        &self,
        statuses: &[OrderStatus],
        limit: u32,
        offset: u64,
    ) -> Result<Vec<OrderId>, StoreError> {
        let g = self.inner.lock().await;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(g.orders
            .iter()
            .filter(|(_, o)| statuses.contains(&o.status))
            .map(|(id, _)| *id)
            .skip(offset)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let g = self.inner.lock().await;
        Ok(g.orders.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryPolicyStore {
    policy: RwLock<SyncPolicy>,
}

impl MemoryPolicyStore {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get_policy(&self) -> Result<SyncPolicy, StoreError> {
        Ok(self.policy.read().await.clone())
    }

    async fn set_policy(&self, policy: SyncPolicy) -> Result<(), StoreError> {
        *self.policy.write().await = policy;
        Ok(())
    }
}
