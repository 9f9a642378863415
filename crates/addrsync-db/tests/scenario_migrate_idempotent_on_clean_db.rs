/// Migrating twice must be a no-op the second time.
///
/// DB-backed test, skipped if ADDRSYNC_DATABASE_URL is not set.
#[tokio::test]
async fn migrate_idempotent_on_clean_db() -> anyhow::Result<()> {
    let url = match std::env::var(addrsync_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: ADDRSYNC_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = addrsync_db::connect(&url).await?;
    addrsync_db::migrate(&pool).await?;
    addrsync_db::migrate(&pool).await?;

    let st = addrsync_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_orders_table);
    Ok(())
}
