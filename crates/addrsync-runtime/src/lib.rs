//! addrsync-runtime
//!
//! Orchestration around the pure reconcile engine:
//!
//! - [`OrderStore`] / [`PolicyStore`]: the host storage contract
//! - [`SyncSession`]: per-request duplicate suppression
//! - [`SyncController`]: one order's load -> compute -> stage -> persist cycle
//! - [`BatchDriver`]: paginated bulk sync over active orders
//!
//! Storage calls are the only suspension points. Nothing here spawns tasks.

pub mod batch;
pub mod controller;
pub mod memory;
pub mod session;
pub mod stats;
pub mod store;

pub use batch::{BatchDriver, BatchResult, BulkSummary};
pub use controller::{SyncController, SyncError, SyncOutcome, SyncStatus};
pub use memory::{MemoryOrderStore, MemoryPolicyStore, StoredOrder};
pub use session::SyncSession;
pub use stats::{collect_address_statistics, AddressStatistics};
pub use store::{OrderStore, PolicyStore, StoreError};
