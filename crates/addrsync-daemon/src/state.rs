//! Shared state for addrsync-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Storage is behind the
//! runtime's store traits, so the same state serves Postgres and in-memory
//! deployments.

use std::sync::Arc;
use std::time::Duration;

use addrsync_reconcile::{AddressRecord, OrderAddresses, OrderId, OrderStatus, SyncPolicy};
use addrsync_runtime::{
    BatchDriver, MemoryOrderStore, MemoryPolicyStore, OrderStore, PolicyStore, StoredOrder,
    SyncController,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    /// One bulk page finished.
    Batch {
        offset: u64,
        synced: u32,
        failed: u32,
        has_more: bool,
    },
    LogLine {
        level: String,
        msg: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub controller: SyncController,
    pub driver: BatchDriver,
    /// When set, every route except health requires a matching
    /// `x-addrsync-token` header.
    pub api_token: Option<String>,
    /// Page size for bulk batches and statistics scans.
    pub page_size: u32,
}

impl AppState {
    pub fn new(orders: Arc<dyn OrderStore>, policy: Arc<dyn PolicyStore>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let controller = SyncController::new(orders, policy);

        Self {
            bus,
            build: BuildInfo {
                service: "addrsync-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            driver: BatchDriver::new(controller.clone()),
            controller,
            api_token: None,
            page_size: addrsync_config::DEFAULT_PAGE_SIZE,
        }
    }

    /// In-memory stores with the given starting policy and orders.
    ///
    /// Nothing persists past the process; orders come only from `orders`.
    pub fn in_memory(policy: SyncPolicy, orders: MemoryOrderStore) -> Self {
        Self::new(Arc::new(orders), Arc::new(MemoryPolicyStore::new(policy)))
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn log_line(&self, level: &str, msg: impl Into<String>) {
        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Seed orders for in-memory mode
// ---------------------------------------------------------------------------

/// One entry of a seed file: `[{"order_id", "status", "billing", "shipping"}]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedOrder {
    pub order_id: OrderId,
    pub status: OrderStatus,
    #[serde(default)]
    pub billing: AddressRecord,
    #[serde(default)]
    pub shipping: AddressRecord,
}

/// Parse a JSON seed document into a memory store. Duplicate ids are rejected.
pub fn seed_orders_from_json(raw: &str) -> anyhow::Result<MemoryOrderStore> {
    let seeds: Vec<SeedOrder> = serde_json::from_str(raw).context("parse seed orders json")?;

    let mut orders = std::collections::BTreeMap::new();
    for s in seeds {
        let stored = StoredOrder {
            status: s.status,
            addresses: OrderAddresses::new(s.billing, s.shipping),
        };
        if orders.insert(s.order_id, stored).is_some() {
            anyhow::bail!("duplicate order_id {} in seed orders", s.order_id);
        }
    }
    Ok(MemoryOrderStore::with_orders(orders))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
