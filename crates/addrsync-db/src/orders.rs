use std::collections::BTreeMap;
use std::str::FromStr;

use addrsync_reconcile::{
    AddressRecord, Field, FieldWrite, OrderAddresses, OrderId, OrderStatus, Role,
};
use addrsync_runtime::{OrderStore, StoreError};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tokio::sync::Mutex;
use tracing::{debug, warn};

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// `OrderStore` over Postgres.
///
/// `set` buffers writes in process; `persist` upserts them in a single
/// transaction together with the order's `updated_at_utc` bump.
/// The upsert only replaces an empty value, so a field filled after the
/// sync loaded the order is left alone.
pub struct PgOrderStore {
    pool: PgPool,
    staged: Mutex<BTreeMap<OrderId, Vec<FieldWrite>>>,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            staged: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_fields(
        &self,
        order_id: OrderId,
        role: Option<Role>,
    ) -> Result<Option<OrderAddresses>, StoreError> {
        if !self.exists(order_id).await? {
            return Ok(None);
        }

        let rows = sqlx::query(
            r#"
            select role, field, value
            from order_address_fields
            where order_id = $1
              and ($2::text is null or role = $2)
            "#,
        )
        .bind(order_id)
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut addresses = OrderAddresses::default();
        for row in rows {
            let role: String = row.try_get("role").map_err(unavailable)?;
            let field: String = row.try_get("field").map_err(unavailable)?;
            let value: String = row.try_get("value").map_err(unavailable)?;

            // Unknown meta keys are not address fields; skip them.
            let (Ok(role), Ok(field)) = (Role::from_str(&role), Field::from_str(&field)) else {
                debug!(order_id, role = %role, field = %field, "ignoring unknown address row");
                continue;
            };
            addresses.record_mut(role).set(field, value);
        }
        Ok(Some(addresses))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn exists(&self, order_id: OrderId) -> Result<bool, StoreError> {
        let (found,): (bool,) = sqlx::query_as::<_, (bool,)>(
            "select exists (select 1 from orders where order_id = $1)",
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(found)
    }

    async fn get(&self, order_id: OrderId, role: Role) -> Result<Option<AddressRecord>, StoreError> {
        Ok(self
            .load_fields(order_id, Some(role))
            .await?
            .map(|a| a.record(role).clone()))
    }

    async fn get_addresses(&self, order_id: OrderId) -> Result<Option<OrderAddresses>, StoreError> {
        self.load_fields(order_id, None).await
    }

    async fn set(
        &self,
        order_id: OrderId,
        role: Role,
        field: Field,
        value: String,
    ) -> Result<(), StoreError> {
        let mut staged = self.staged.lock().await;
        staged
            .entry(order_id)
            .or_default()
            .push(FieldWrite::new(role, field, value));
        Ok(())
    }

    async fn persist(&self, order_id: OrderId) -> Result<(), StoreError> {
        let writes = self.staged.lock().await.remove(&order_id).unwrap_or_default();
        if writes.is_empty() {
            return Ok(());
        }

        let write_err = |err: sqlx::Error| StoreError::Write {
            order_id,
            message: err.to_string(),
        };

        let mut tx = self.pool.begin().await.map_err(write_err)?;

        let touched = sqlx::query("update orders set updated_at_utc = $2 where order_id = $1")
            .bind(order_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        if touched.rows_affected() == 0 {
            // tx dropped here rolls back.
            return Err(StoreError::NotFound { order_id });
        }

        for w in &writes {
            sqlx::query(
                r#"
                insert into order_address_fields (order_id, role, field, value)
                values ($1, $2, $3, $4)
                on conflict (order_id, role, field) do update
                  set value = excluded.value
                  where order_address_fields.value = ''
                "#,
            )
            .bind(order_id)
            .bind(w.role.as_str())
            .bind(w.field.as_str())
            .bind(&w.value)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(write_err)?;
        debug!(order_id, writes = writes.len(), "persisted address fields");
        Ok(())
    }

    async fn discard(&self, order_id: OrderId) {
        if let Some(dropped) = self.staged.lock().await.remove(&order_id) {
            warn!(order_id, dropped = dropped.len(), "discarded staged writes");
        }
    }

    async fn query(
        &self,
        statuses: &[OrderStatus],
        limit: u32,
        offset: u64,
    ) -> Result<Vec<OrderId>, StoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let ids: Vec<(i64,)> = sqlx::query_as::<_, (i64,)>(
            r#"
            select order_id
            from orders
            where status = any($1)
            order by order_id asc
            limit $2 offset $3
            "#,
        )
        .bind(&statuses)
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>("select count(*)::bigint from orders")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

/// Insert or replace an order with its full address set.
///
/// Host-side seeding and import; sync itself only ever writes through
/// [`PgOrderStore`].
pub async fn upsert_order(
    pool: &PgPool,
    order_id: OrderId,
    status: OrderStatus,
    addresses: &OrderAddresses,
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await.context("upsert_order begin failed")?;

    sqlx::query(
        r#"
        insert into orders (order_id, status)
        values ($1, $2)
        on conflict (order_id) do update
          set status = excluded.status, updated_at_utc = now()
        "#,
    )
    .bind(order_id)
    .bind(status.as_str())
    .execute(&mut *tx)
    .await
    .context("upsert_order orders row failed")?;

    sqlx::query("delete from order_address_fields where order_id = $1")
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .context("upsert_order clear fields failed")?;

    for role in Role::ALL {
        let record = addresses.record(role);
        for field in Field::ALL {
            let value = record.get(field);
            if value.is_empty() {
                continue;
            }
            sqlx::query(
                "insert into order_address_fields (order_id, role, field, value) values ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(role.as_str())
            .bind(field.as_str())
            .bind(value)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("upsert_order {role}_{field} failed"))?;
        }
    }

    tx.commit().await.context("upsert_order commit failed")?;
    Ok(())
}
