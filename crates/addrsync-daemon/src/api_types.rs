//! Request and response bodies for the daemon's HTTP endpoints.
//!
//! No business logic lives here.

use std::collections::BTreeMap;

use addrsync_reconcile::OrderId;
use addrsync_runtime::{SyncOutcome, SyncStatus};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

// ---------------------------------------------------------------------------
// Errors (403 / 404 / 500)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Single-order sync and trigger hooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    /// `true` iff at least one field was written.
    pub success: bool,
    pub message: String,
    pub status: SyncStatus,
    /// `"{role}_{field}"` keys that were written.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl From<&SyncOutcome> for SyncResponse {
    fn from(o: &SyncOutcome) -> Self {
        Self {
            success: o.is_synced(),
            message: o.message().to_string(),
            status: o.status,
            fields: o.writes.iter().map(|w| w.key()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSavedHook {
    pub order_id: OrderId,
    /// Raw submitted form, e.g. `{"_shipping_city": "Luxor"}`.
    #[serde(default)]
    pub form: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedHook {
    pub order_id: OrderId,
}

// ---------------------------------------------------------------------------
// /v1/bulk/batch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkBatchRequest {
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkBatchResponse {
    pub synced: u32,
    pub failed: u32,
    pub has_more: bool,
    /// Offset for the next call.
    pub offset: u64,
}
