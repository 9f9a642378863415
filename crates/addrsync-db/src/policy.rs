use addrsync_reconcile::SyncPolicy;
use addrsync_runtime::{PolicyStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::warn;

/// Row key under which the policy document is stored.
pub const POLICY_KEY: &str = "address_sync_policy";

pub struct PgPolicyStore {
    pool: PgPool,
}

impl PgPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    /// Missing row means defaults. A stored document that no longer parses
    /// also falls back to defaults, with a warning.
    async fn get_policy(&self) -> Result<SyncPolicy, StoreError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as::<_, (serde_json::Value,)>("select value from sync_settings where key = $1")
                .bind(POLICY_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let Some((value,)) = row else {
            return Ok(SyncPolicy::default());
        };

        match serde_json::from_value::<SyncPolicy>(value) {
            Ok(policy) => Ok(policy),
            Err(err) => {
                warn!(error = %err, "stored sync policy is malformed; using defaults");
                Ok(SyncPolicy::default())
            }
        }
    }

    async fn set_policy(&self, policy: SyncPolicy) -> Result<(), StoreError> {
        let value = serde_json::to_value(&policy)
            .map_err(|e| StoreError::Unavailable(format!("encode policy: {e}")))?;

        sqlx::query(
            r#"
            insert into sync_settings (key, value, updated_at_utc)
            values ($1, $2, $3)
            on conflict (key) do update
              set value = excluded.value, updated_at_utc = excluded.updated_at_utc
            "#,
        )
        .bind(POLICY_KEY)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
