use addrsync_reconcile::{is_address_complete, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::controller::SyncError;
use crate::store::OrderStore;

/// Completeness counts over active orders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressStatistics {
    pub active_orders: u64,
    pub incomplete_billing_orders: u64,
    pub incomplete_shipping_orders: u64,
}

/// Walk every active order page by page and count incomplete addresses.
pub async fn collect_address_statistics(
    store: &dyn OrderStore,
    page_size: u32,
) -> Result<AddressStatistics, SyncError> {
    let page_size = page_size.max(1);
    let mut stats = AddressStatistics::default();
    let mut offset = 0u64;

    loop {
        let ids = store
            .query(&OrderStatus::ACTIVE, page_size, offset)
            .await
            .map_err(|source| SyncError::StorageRead {
                order_id: None,
                source,
            })?;
        if ids.is_empty() {
            break;
        }

        for order_id in &ids {
            let addresses = store
                .get_addresses(*order_id)
                .await
                .map_err(|source| SyncError::StorageRead {
                    order_id: Some(*order_id),
                    source,
                })?;
            // Deleted between the page query and this read.
            let Some(addresses) = addresses else {
                continue;
            };

            stats.active_orders += 1;
            if !is_address_complete(&addresses.billing) {
                stats.incomplete_billing_orders += 1;
            }
            if !is_address_complete(&addresses.shipping) {
                stats.incomplete_shipping_orders += 1;
            }
        }

        offset += ids.len() as u64;
    }

    Ok(stats)
}
