//! Gildex Server
//!
//! A guild activity stock market: activity events drive per-participant
//! valuations, holdings, and ranked leaderboards.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use gildex_core::admission::AdmissionGate;
use gildex_core::coordination::{JobRunner, claim_slot, spawn_heartbeat};
use gildex_core::engine::{Aggregator, DecaySweepJob, LeaderboardResyncJob};
use gildex_core::events::{EventSenders, activity_recorded_channel, flush_tick_channel};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Gildex - guild activity stock-market engine
#[derive(Parser, Debug)]
#[command(name = "gildex-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./gildex-config.toml")]
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

    tracing::info!("Starting gildex-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let shared_config = loaded_config.into_shared();

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
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
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // This process's lease identity, shared by the cluster slot and the
    // job locks.
    let owner = uuid::Uuid::new_v4().to_string();

    // Shutdown fan-out for the background loops.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Claim a cluster slot before doing any shard-bound work; startup
    // blocks here until one frees up.
    let cluster = shared_config.cluster;
    let mut slot_lost_rx = None;
    let mut heartbeat_handle = None;
    if cluster.enabled {
        let claimed = claim_slot(&db_pool, &cluster, &owner).await?;
        let (handle, lost_rx) =
            spawn_heartbeat(db_pool.clone(), claimed, cluster, shutdown_rx.clone());
        heartbeat_handle = Some(handle);
        slot_lost_rx = Some(lost_rx);
    } else {
        tracing::warn!("Cluster coordination disabled; running unpartitioned");
    }

    // Event channels and the aggregator loop.
    let (activity_tx, activity_rx) = activity_recorded_channel();
    let (flush_tx, flush_rx) = flush_tick_channel();
    let event_senders = EventSenders::new(activity_tx, flush_tx.clone());

    let aggregator = Aggregator::new(db_pool.clone(), shared_config.engine.clone(), flush_tx);
    let aggregator_handle = tokio::spawn(aggregator.run(shutdown_rx.clone(), activity_rx, flush_rx));

    // Periodic maintenance jobs behind cross-replica locks.
    let mut job_runner = JobRunner::new(db_pool.clone(), owner.clone());
    job_runner.register(Arc::new(DecaySweepJob::new(
        db_pool.clone(),
        shared_config.engine.clone(),
        shared_config.jobs,
    )))?;
    job_runner.register(Arc::new(LeaderboardResyncJob::new(
        db_pool.clone(),
        shared_config.jobs,
    )))?;
    let jobs_handle = tokio::spawn(job_runner.run(shutdown_rx.clone()));

    // HTTP surface.
    let gate = AdmissionGate::new(db_pool.clone(), shared_config.rate_limit.clone());
    let app_state = AppState::new(db_pool.clone(), shared_config, gate, event_senders);

    let reload_notify = spawn_config_reload_handler(app_state.clone(), config_loader);

    let router = build_router(app_state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = tokio::select! {
        result = run_server(router, listen_addr) => result,

        _ = slot_lost(&mut slot_lost_rx) => {
            // Continuing without the slot would risk two processes serving
            // the same shard range; exit for supervised restart.
            tracing::error!("Cluster slot ownership lost; terminating");
            std::process::exit(1);
        }
    };

    // Stop the background loops.
    let _ = shutdown_tx.send(true);
    reload_notify.notify_one();
    let _ = aggregator_handle.await;
    let _ = jobs_handle.await;
    if let Some(handle) = heartbeat_handle {
        let _ = handle.await;
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Resolves when the cluster slot is observed lost; pends forever when
/// coordination is disabled.
async fn slot_lost(rx: &mut Option<watch::Receiver<bool>>) {
    match rx {
        Some(rx) => loop {
            if rx.changed().await.is_err() {
                // Heartbeat ended without reporting a loss (clean
                // shutdown); nothing further will arrive.
                std::future::pending::<()>().await;
            }
            if *rx.borrow() {
                return;
            }
        },
        None => std::future::pending().await,
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
