//! Host storage boundary.
//!
//! This module defines **only** the contract the core consumes. Concrete
//! backends live elsewhere (`memory.rs` for tests and embedding, the
//! `addrsync-db` crate for Postgres).
//!
//! Write path: every field write goes through [`OrderStore::set`], which
//! stages it, and becomes visible to readers only after a single
//! [`OrderStore::persist`] for that order. There is no second write path.

use std::fmt;

use addrsync_reconcile::{AddressRecord, Field, OrderAddresses, OrderId, OrderStatus, Role, SyncPolicy};
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a storage backend may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The order does not exist (only raised where a caller assumed it did).
    NotFound { order_id: OrderId },
    /// Backend unreachable or a read failed.
    Unavailable(String),
    /// A staged write or commit was rejected.
    Write { order_id: OrderId, message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { order_id } => write!(f, "order {order_id} not found"),
            StoreError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
            StoreError::Write { order_id, message } => {
                write!(f, "storage write failed for order {order_id}: {message}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Order store
// ---------------------------------------------------------------------------

/// Address record accessor plus the order collection queries bulk sync needs.
///
/// Object-safe so callers can hold an `Arc<dyn OrderStore>`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn exists(&self, order_id: OrderId) -> Result<bool, StoreError>;

    /// Committed address for one role. `None` when the order does not exist.
    async fn get(&self, order_id: OrderId, role: Role) -> Result<Option<AddressRecord>, StoreError>;

    /// Stage one field write. Not visible until [`OrderStore::persist`].
    async fn set(
        &self,
        order_id: OrderId,
        role: Role,
        field: Field,
        value: String,
    ) -> Result<(), StoreError>;

    /// Commit every staged write for the order in one atomic step.
    ///
    /// Staged writes are consumed whether or not the commit succeeds.
    /// Persisting with nothing staged is a no-op.
    async fn persist(&self, order_id: OrderId) -> Result<(), StoreError>;

    /// Drop staged writes for the order without committing.
    async fn discard(&self, order_id: OrderId);

    /// Order ids with one of `statuses`, ascending by id, paginated.
    async fn query(
        &self,
        statuses: &[OrderStatus],
        limit: u32,
        offset: u64,
    ) -> Result<Vec<OrderId>, StoreError>;

    /// Count of all orders, every status included.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Both records of an order, or `None` if it does not exist.
    async fn get_addresses(&self, order_id: OrderId) -> Result<Option<OrderAddresses>, StoreError> {
        if !self.exists(order_id).await? {
            return Ok(None);
        }
        let billing = self.get(order_id, Role::Billing).await?.unwrap_or_default();
        let shipping = self.get(order_id, Role::Shipping).await?.unwrap_or_default();
        Ok(Some(OrderAddresses::new(billing, shipping)))
    }
}

// ---------------------------------------------------------------------------
// Policy store
// ---------------------------------------------------------------------------

/// Settings storage. Read on every sync; implementations must not cache
/// across calls unless they observe every change.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get_policy(&self) -> Result<SyncPolicy, StoreError>;

    async fn set_policy(&self, policy: SyncPolicy) -> Result<(), StoreError>;
}
