use std::fs;
use std::sync::Arc;
use std::time::Duration;

use addrsync_config::{AddressSyncConfig, UnusedKeyPolicy};
use addrsync_db::{PgOrderStore, PgPolicyStore};
use addrsync_reconcile::{ExclusionSet, Field, OrderAddresses, OrderId, OrderStatus, SyncDirection};
use addrsync_runtime::{
    collect_address_statistics, BatchDriver, OrderStore, PolicyStore, SyncController, SyncSession,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "addrsync")]
#[command(about = "Billing/shipping address sync CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local...)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail instead of warning when the config has keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Sync one order now (ignores auto_sync_enabled)
    Sync {
        #[arg(long)]
        order_id: OrderId,

        /// `role_field` keys that must not be written, e.g. shipping_phone
        #[arg(long = "exclude", value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Sync every active order, one page at a time
    Bulk {
        /// Layered config paths supplying bulk defaults
        #[arg(long = "config")]
        config_paths: Vec<String>,

        #[arg(long)]
        page_size: Option<u32>,

        /// Pause between pages, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Print an order's billing and shipping addresses as JSON
    Show {
        #[arg(long)]
        order_id: OrderId,
    },

    /// Insert or replace an order from a JSON file `{billing, shipping}`
    Put {
        #[arg(long)]
        order_id: OrderId,

        #[arg(long, default_value = "processing")]
        status: String,

        #[arg(long)]
        file: String,
    },

    /// Count active orders with incomplete addresses
    Stats {
        #[arg(long, default_value_t = addrsync_config::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },

    /// Show or change the stored sync policy
    Policy {
        #[command(subcommand)]
        cmd: PolicyCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum PolicyCmd {
    Show,

    /// Update selected policy settings; unspecified ones keep their value.
    Set {
        #[arg(long)]
        auto_sync: Option<bool>,

        /// both | billing_to_shipping | shipping_to_billing
        #[arg(long)]
        direction: Option<String>,

        /// Comma-separated field names, e.g. first_name,city,postcode
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
    },

    /// Seed the stored policy from layered config files
    Load {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = addrsync_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = addrsync_db::status(&pool).await?;
                    println!("db_ok={} has_orders_table={}", s.ok, s.has_orders_table);
                }
                DbCmd::Migrate => {
                    addrsync_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths, strict } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = addrsync_config::load_layered_yaml(&path_refs)?;
            let policy = if strict {
                UnusedKeyPolicy::Fail
            } else {
                UnusedKeyPolicy::Warn
            };
            let report = addrsync_config::report_unused_keys(&loaded.config_json, policy)?;
            for key in &report.unused_leaf_pointers {
                eprintln!("warning: unused config key {key}");
            }
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Sync { order_id, exclude } => {
            let excluded = ExclusionSet::parse(&exclude).context("invalid --exclude key")?;
            let controller = controller_from_env().await?;
            let outcome = controller
                .sync(&mut SyncSession::new(), order_id, &excluded)
                .await?;
            println!("order_id={}", outcome.order_id);
            println!("success={}", outcome.is_synced());
            println!("message={}", outcome.message());
            for w in &outcome.writes {
                println!("wrote {}={}", w.key(), w.value);
            }
        }

        Commands::Bulk {
            config_paths,
            page_size,
            delay_ms,
        } => {
            let settings = settings_from_paths(&config_paths)?;
            let page_size = page_size.unwrap_or(settings.bulk.page_size);
            let delay = Duration::from_millis(delay_ms.unwrap_or(settings.bulk.delay_ms));

            let driver = BatchDriver::new(controller_from_env().await?);
            let summary = driver
                .run_bulk(page_size, delay, |b| {
                    println!(
                        "batch next_offset={} synced={} failed={} has_more={}",
                        b.next_offset, b.synced_count, b.failed_count, b.has_more
                    );
                })
                .await?;
            println!(
                "bulk_done batches={} synced={} failed={}",
                summary.batches, summary.synced, summary.failed
            );
        }

        Commands::Show { order_id } => {
            let store = PgOrderStore::new(addrsync_db::connect_from_env().await?);
            let Some(addresses) = store.get_addresses(order_id).await? else {
                bail!("order {order_id} not found");
            };
            println!("{}", serde_json::to_string_pretty(&addresses)?);
        }

        Commands::Put {
            order_id,
            status,
            file,
        } => {
            let status: OrderStatus = status.parse().map_err(anyhow::Error::msg)?;
            let raw = fs::read_to_string(&file).with_context(|| format!("read {file}"))?;
            let addresses: OrderAddresses =
                serde_json::from_str(&raw).with_context(|| format!("parse {file}"))?;

            let pool = addrsync_db::connect_from_env().await?;
            addrsync_db::upsert_order(&pool, order_id, status, &addresses).await?;
            println!("order_id={order_id} status={status} stored=true");
        }

        Commands::Stats { page_size } => {
            let store = PgOrderStore::new(addrsync_db::connect_from_env().await?);
            let stats = collect_address_statistics(&store, page_size).await?;
            println!("active_orders={}", stats.active_orders);
            println!("incomplete_billing_orders={}", stats.incomplete_billing_orders);
            println!("incomplete_shipping_orders={}", stats.incomplete_shipping_orders);
        }

        Commands::Policy { cmd } => {
            let store = PgPolicyStore::new(addrsync_db::connect_from_env().await?);
            match cmd {
                PolicyCmd::Show => {}
                PolicyCmd::Set {
                    auto_sync,
                    direction,
                    fields,
                } => {
                    let mut policy = store.get_policy().await?;
                    if let Some(on) = auto_sync {
                        policy.auto_sync_enabled = on;
                    }
                    if let Some(d) = direction {
                        policy.direction = d.parse::<SyncDirection>().map_err(anyhow::Error::msg)?;
                    }
                    if let Some(names) = fields {
                        policy.fields = parse_fields(&names)?;
                    }
                    store.set_policy(policy).await?;
                    info!("policy updated");
                }
                PolicyCmd::Load { paths } => {
                    let settings = settings_from_paths(&paths)?;
                    store.set_policy(settings.policy).await?;
                    info!("policy loaded from config");
                }
            }
            let policy = store.get_policy().await?;
            println!("{}", serde_json::to_string_pretty(&policy)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

async fn controller_from_env() -> Result<SyncController> {
    let pool = addrsync_db::connect_from_env().await?;
    Ok(SyncController::new(
        Arc::new(PgOrderStore::new(pool.clone())),
        Arc::new(PgPolicyStore::new(pool)),
    ))
}

/// Empty path list means built-in defaults.
fn settings_from_paths(paths: &[String]) -> Result<AddressSyncConfig> {
    if paths.is_empty() {
        return Ok(AddressSyncConfig::default());
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = addrsync_config::load_layered_yaml(&path_refs)?;
    addrsync_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    info!(config_hash = %loaded.config_hash, "config loaded");
    Ok(loaded.settings)
}

fn parse_fields(names: &[String]) -> Result<Vec<Field>> {
    let mut out: Vec<Field> = Vec::with_capacity(names.len());
    for name in names {
        let f: Field = name.trim().parse().map_err(anyhow::Error::msg)?;
        if !out.contains(&f) {
            out.push(f);
        }
    }
    if out.is_empty() {
        bail!("--fields must name at least one field");
    }
    Ok(out)
}
