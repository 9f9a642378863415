use std::collections::BTreeSet;

use addrsync_reconcile::OrderId;

/// Duplicate suppression for one logical request.
///
/// Construct one per request and drop it at request end. Never shared across
/// concurrent requests and never persisted, so the guarantee is at most one
/// sync per order id per session.
#[derive(Debug, Default, Clone)]
pub struct SyncSession {
    processed: BTreeSet<OrderId>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, order_id: OrderId) -> bool {
        self.processed.contains(&order_id)
    }

    /// Mark `order_id` processed. Returns `false` if it already was.
    pub fn mark_processed(&mut self, order_id: OrderId) -> bool {
        self.processed.insert(order_id)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}
