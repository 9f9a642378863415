//! Bulk sync over the order collection, one page at a time.
//!
//! `has_more` compares `offset + page_size` against the count of **all**
//! orders while the page itself only holds active-status orders. The estimate
//! can overshoot by one page; an empty page always ends the run.

use std::time::Duration;

use addrsync_reconcile::{ExclusionSet, OrderId, OrderStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::controller::{SyncController, SyncError};
use crate::session::SyncSession;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Orders on this page that received at least one write.
    pub synced_count: u32,
    /// Orders on this page whose sync hit a storage error.
    pub failed_count: u32,
    /// Orders returned by the page query.
    pub fetched: u32,
    pub next_offset: u64,
    pub has_more: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub batches: u32,
    pub synced: u64,
    pub failed: u64,
    pub final_offset: u64,
}

#[derive(Clone)]
pub struct BatchDriver {
    controller: SyncController,
}

impl BatchDriver {
    pub fn new(controller: SyncController) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &SyncController {
        &self.controller
    }

    /// Sync one page of active orders starting at `offset`.
    ///
    /// A failure on one order is counted and skipped. Only a failure to
    /// fetch the page or the total count is returned as an error.
    /// A `page_size` of zero is treated as one.
    pub async fn run_batch(
        &self,
        session: &mut SyncSession,
        offset: u64,
        page_size: u32,
    ) -> Result<BatchResult, SyncError> {
        let page_size = page_size.max(1);
        let store = self.controller.orders();

        let ids: Vec<OrderId> = store
            .query(&OrderStatus::ACTIVE, page_size, offset)
            .await
            .map_err(|source| SyncError::StorageRead {
                order_id: None,
                source,
            })?;

        let total = store.count().await.map_err(|source| SyncError::StorageRead {
            order_id: None,
            source,
        })?;

        let no_exclusions = ExclusionSet::new();
        let mut result = BatchResult {
            fetched: ids.len() as u32,
            ..BatchResult::default()
        };

        for order_id in ids {
            match self.controller.sync(session, order_id, &no_exclusions).await {
                Ok(outcome) if outcome.is_synced() => result.synced_count += 1,
                Ok(_) => {}
                Err(err) => {
                    warn!(order_id, error = %err, "bulk sync: order failed; continuing");
                    result.failed_count += 1;
                }
            }
        }

        let next_offset = offset.saturating_add(u64::from(page_size));
        result.next_offset = next_offset;
        result.has_more = result.fetched > 0 && next_offset < total;

        debug!(
            offset,
            page_size,
            total,
            fetched = result.fetched,
            synced = result.synced_count,
            failed = result.failed_count,
            has_more = result.has_more,
            session_processed = session.processed_count(),
            "batch done"
        );

        Ok(result)
    }

    /// Drive `run_batch` from offset 0 until no more pages remain.
    ///
    /// Each batch gets a fresh [`SyncSession`], as if it were its own request.
    /// `delay` is slept between batches to bound load on the store.
    /// `on_batch` sees every batch result as it completes.
    pub async fn run_bulk<F>(
        &self,
        page_size: u32,
        delay: Duration,
        mut on_batch: F,
    ) -> Result<BulkSummary, SyncError>
    where
        F: FnMut(&BatchResult) + Send,
    {
        let mut summary = BulkSummary::default();
        let mut offset = 0u64;

        loop {
            let mut session = SyncSession::new();
            let batch = self.run_batch(&mut session, offset, page_size).await?;

            summary.batches += 1;
            summary.synced += u64::from(batch.synced_count);
            summary.failed += u64::from(batch.failed_count);
            summary.final_offset = batch.next_offset;
            on_batch(&batch);

            if !batch.has_more {
                break;
            }
            offset = batch.next_offset;

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        info!(
            batches = summary.batches,
            synced = summary.synced,
            failed = summary.failed,
            "bulk sync complete"
        );
        Ok(summary)
    }
}
