//! NFT Vault Server
//!
//! Sells one NFT through hosted checkouts (Stripe, Coinbase Commerce,
//! PayPal) and hands out single-use claims for buyers without a wallet.

mod api;
mod config;
mod server;
mod shutdown;
mod state;


use clap::Parser;
use config::file::StorageBackend;
use config::{ConfigLoader, get_database_url};
use nftvault_core::lifecycle::OrderLifecycle;
use nftvault_core::storage::{KvStore, MemoryKvStore, PgKvStore};
use server::{build_router, run_server};
use shutdown::spawn_purge_task;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// NFT Vault - order, payment and claim lifecycle server
#[derive(Parser, Debug)]
#[command(name = "nftvault-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./nftvault-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting nftvault-server v{}", env!("CARGO_PKG_VERSION"));

    let loaded_config = ConfigLoader::new(&args.config, args.listen)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    let listen_addr = loaded_config.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let mut db_pool = None;
    let mut purge_notify = None;
    let store: Arc<dyn KvStore> = match loaded_config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; orders will not survive a restart");
            Arc::new(MemoryKvStore::new())
        }
        StorageBackend::Postgres => {
            let database_url = get_database_url().map_err(|e| {
                tracing::error!("DATABASE_URL environment variable not set");
                e
            })?;

            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(loaded_config.storage.max_connections)
                .connect(&database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            if args.migrate {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("../migrations")
                    .run(&pool)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to run migrations: {}", e);
                        e
                    })?;
                tracing::info!("Migrations completed successfully");
            }

            let store = PgKvStore::new(pool.clone());
            if loaded_config.storage.purge_interval_secs > 0 {
                purge_notify = Some(spawn_purge_task(
                    store.clone(),
                    Duration::from_secs(loaded_config.storage.purge_interval_secs),
                ));
            }
            db_pool = Some(pool);
            Arc::new(store)
        }
    };

    let lifecycle = OrderLifecycle::from_config(store, &loaded_config.vault);
    let state = AppState::new(lifecycle, loaded_config.vault.admin);
    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    if let Some(notify) = purge_notify {
        notify.notify_one();
    }
    if let Some(pool) = db_pool {
        tracing::info!("Closing database connections...");
        pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
