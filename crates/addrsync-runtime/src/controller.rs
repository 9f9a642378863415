//! Single-order sync.
//!
//! Steps for [`SyncController::sync`]:
//! 1. Session check: an order already seen in this session is skipped.
//! 2. Mark processed before any IO, so a save that re-enters the trigger for
//!    the same order is a no-op.
//! 3. Load both records; a missing order is an outcome, not an error.
//! 4. Read the policy fresh and compute writes.
//! 5. Stage every write, then persist once.
//!
//! Only storage failures are errors. A failed persist is reported as
//! [`SyncError::StorageWrite`] and carries the writes that were lost.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use addrsync_reconcile::{compute, ExclusionSet, FieldWrite, OrderId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::session::SyncSession;
use crate::store::{OrderStore, PolicyStore, StoreError};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// At least one field was written and committed.
    Synced,
    /// Nothing to fill.
    NothingToDo,
    NotFound,
    /// Seen earlier in this session.
    AlreadyProcessed,
    /// Auto-sync is off; only returned by the trigger helpers.
    PolicyDisabled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub order_id: OrderId,
    pub status: SyncStatus,
    pub writes: Vec<FieldWrite>,
}

impl SyncOutcome {
    fn new(order_id: OrderId, status: SyncStatus) -> Self {
        Self {
            order_id,
            status,
            writes: Vec::new(),
        }
    }

    /// `true` iff at least one field was written.
    pub fn is_synced(&self) -> bool {
        self.status == SyncStatus::Synced
    }

    /// Human-readable reason, suitable for UI messages.
    pub fn message(&self) -> &'static str {
        match self.status {
            SyncStatus::Synced => "Addresses synced successfully",
            SyncStatus::NothingToDo => "No sync needed or addresses already complete",
            SyncStatus::NotFound => "Order not found",
            SyncStatus::AlreadyProcessed => "Order already processed in this request",
            SyncStatus::PolicyDisabled => "Automatic address sync is disabled",
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Loading an order, the policy, or a page of orders failed.
    StorageRead {
        order_id: Option<OrderId>,
        source: StoreError,
    },
    /// Writes were computed but could not be staged or committed.
    StorageWrite {
        order_id: OrderId,
        lost_writes: Vec<FieldWrite>,
        source: StoreError,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::StorageRead {
                order_id: Some(id),
                source,
            } => write!(f, "failed to read order {id}: {source}"),
            SyncError::StorageRead {
                order_id: None,
                source,
            } => write!(f, "failed to read from order storage: {source}"),
            SyncError::StorageWrite {
                order_id,
                lost_writes,
                source,
            } => write!(
                f,
                "failed to persist {} field write(s) for order {order_id}: {source}",
                lost_writes.len()
            ),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::StorageRead { source, .. } | SyncError::StorageWrite { source, .. } => {
                Some(source)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SyncController {
    orders: Arc<dyn OrderStore>,
    policy: Arc<dyn PolicyStore>,
}

impl SyncController {
    pub fn new(orders: Arc<dyn OrderStore>, policy: Arc<dyn PolicyStore>) -> Self {
        Self { orders, policy }
    }

    pub fn orders(&self) -> &Arc<dyn OrderStore> {
        &self.orders
    }

    pub fn policy_store(&self) -> &Arc<dyn PolicyStore> {
        &self.policy
    }

    /// Reconcile one order. `excluded` pairs are never written.
    ///
    /// Ignores `auto_sync_enabled`; automatic triggers go through
    /// [`SyncController::sync_if_enabled`].
    pub async fn sync(
        &self,
        session: &mut SyncSession,
        order_id: OrderId,
        excluded: &ExclusionSet,
    ) -> Result<SyncOutcome, SyncError> {
        if !session.mark_processed(order_id) {
            debug!(order_id, "skipping duplicate sync");
            return Ok(SyncOutcome::new(order_id, SyncStatus::AlreadyProcessed));
        }

        let addresses = self
            .orders
            .get_addresses(order_id)
            .await
            .map_err(|source| SyncError::StorageRead {
                order_id: Some(order_id),
                source,
            })?;
        let Some(addresses) = addresses else {
            debug!(order_id, "order not found");
            return Ok(SyncOutcome::new(order_id, SyncStatus::NotFound));
        };

        let policy = self
            .policy
            .get_policy()
            .await
            .map_err(|source| SyncError::StorageRead {
                order_id: Some(order_id),
                source,
            })?;

        let writes = compute(
            &addresses.billing,
            &addresses.shipping,
            policy.direction,
            &policy.fields,
            excluded,
        );

        debug!(
            order_id,
            direction = %policy.direction,
            excluded = ?excluded.keys(),
            planned = writes.len(),
            "reconciled"
        );

        if writes.is_empty() {
            return Ok(SyncOutcome::new(order_id, SyncStatus::NothingToDo));
        }

        let mut staging_error: Option<StoreError> = None;
        for w in &writes {
            if let Err(source) = self
                .orders
                .set(order_id, w.role, w.field, w.value.clone())
                .await
            {
                warn!(order_id, field = %w.key(), error = %source, "staging write failed");
                staging_error = Some(source);
                break;
            }
        }
        if let Some(source) = staging_error {
            self.orders.discard(order_id).await;
            return Err(SyncError::StorageWrite {
                order_id,
                lost_writes: writes,
                source,
            });
        }

        if let Err(source) = self.orders.persist(order_id).await {
            warn!(order_id, error = %source, "persist failed after sync");
            return Err(SyncError::StorageWrite {
                order_id,
                lost_writes: writes,
                source,
            });
        }

        let fields: Vec<String> = writes.iter().map(FieldWrite::key).collect();
        info!(order_id, fields = ?fields, "addresses synced");

        Ok(SyncOutcome {
            order_id,
            status: SyncStatus::Synced,
            writes,
        })
    }

    /// Gate for automatic triggers: does nothing when auto-sync is off.
    ///
    /// A disabled policy does not mark the order processed.
    pub async fn sync_if_enabled(
        &self,
        session: &mut SyncSession,
        order_id: OrderId,
        excluded: &ExclusionSet,
    ) -> Result<SyncOutcome, SyncError> {
        let policy = self
            .policy
            .get_policy()
            .await
            .map_err(|source| SyncError::StorageRead {
                order_id: Some(order_id),
                source,
            })?;

        if !policy.auto_sync_enabled {
            debug!(order_id, "auto sync disabled; trigger ignored");
            return Ok(SyncOutcome::new(order_id, SyncStatus::PolicyDisabled));
        }

        self.sync(session, order_id, excluded).await
    }

    /// Trigger: an order was saved from the edit form.
    ///
    /// Every non-empty submitted `_{role}_{field}` value is treated as
    /// authoritative and excluded from the sync.
    pub async fn on_order_saved(
        &self,
        session: &mut SyncSession,
        order_id: OrderId,
        submitted_form: &BTreeMap<String, String>,
    ) -> Result<SyncOutcome, SyncError> {
        let excluded = ExclusionSet::from_submitted_form(
            submitted_form
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        self.sync_if_enabled(session, order_id, &excluded).await
    }

    /// Trigger: an order was created programmatically. No exclusions.
    pub async fn on_order_created(
        &self,
        session: &mut SyncSession,
        order_id: OrderId,
    ) -> Result<SyncOutcome, SyncError> {
        self.sync_if_enabled(session, order_id, &ExclusionSet::new())
            .await
    }
}
