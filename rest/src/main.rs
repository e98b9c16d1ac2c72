//! Boskos process entry point (SPEC_FULL.md §2 "Process shell"). Parses CLI
//! flags, builds the `Store`, hydrates the `core::Ledger`, spawns the
//! background reconciliation loops (reaper, request-queue GC, dynamic
//! updater, config watcher) and serves the HTTP API. `Ctrl+C`/SIGTERM trips
//! the shared `shutdown::Shutdown` signal; each background task finishes its
//! current iteration and exits.

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use common_lib::config::BoskosConfig;
use core_engine::{Clock, ConfigLoader, DynamicResourceUpdater, Ledger, Reaper, SystemClock};
use rest::{handlers, state::AppState};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use store::{file::FileStore, memory::MemoryStore, Store};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "boskos", about = "Resource-leasing service for shared, mutually-exclusive infrastructure")]
struct CliArgs {
    /// Path to the declarative config file listing static resources, DRLCs
    /// and reaper expiration policies (spec.md §4.6, §6).
    #[structopt(long, parse(from_os_str))]
    config: PathBuf,

    /// Address the HTTP API listens on.
    #[structopt(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Path to a JSON snapshot file for durable storage. When omitted the
    /// ledger is kept in memory only and does not survive a restart
    /// (spec.md §9 open question).
    #[structopt(long, parse(from_os_str))]
    store_path: Option<PathBuf>,

    /// How often the reaper sweeps for stale owners (spec.md §4.4).
    #[structopt(long, default_value = "1m")]
    reaper_interval: humantime::Duration,

    /// How often the dynamic resource updater reconciles pools; 0 disables
    /// it (spec.md §4.5).
    #[structopt(long, default_value = "10m")]
    updater_interval: humantime::Duration,

    /// How often the config file is re-read for changes (spec.md §4.6).
    #[structopt(long, default_value = "10s")]
    config_interval: humantime::Duration,

    /// How often expired request-queue entries are garbage collected
    /// (spec.md §4.3, default every minute).
    #[structopt(long, default_value = "1m")]
    request_gc_interval: humantime::Duration,

    /// Maximum age a queued Acquire request retains its position before
    /// being dropped (spec.md §4.3, default 30s).
    #[structopt(long, default_value = "30s")]
    request_ttl: humantime::Duration,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::from_args();
    utils::init_tracing();
    tracing::info!(version = utils::VERSION, ?args, "starting boskos");

    let store: Arc<dyn Store> = match &args.store_path {
        Some(path) => Arc::new(
            FileStore::open(path)
                .await
                .with_context(|| format!("failed to open durable store at '{}'", path.display()))?,
        ),
        None => {
            tracing::warn!("no --store-path given, running with an in-memory store (no durability across restarts)");
            Arc::new(MemoryStore::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let request_ttl = chrono::Duration::from_std(args.request_ttl.into()).context("request-ttl out of range")?;
    let ledger = Arc::new(Ledger::new(store, clock.clone(), request_ttl));
    ledger.hydrate().await.context("failed to hydrate ledger from store")?;

    // A malformed or unreadable config file is a fatal startup failure
    // (spec.md §7); periodic reloads, by contrast, log and keep the
    // previous config active (see ConfigLoader::run below).
    let raw = tokio::fs::read_to_string(&args.config)
        .await
        .with_context(|| format!("failed to read config file '{}'", args.config.display()))?;
    let config = BoskosConfig::parse(&raw).with_context(|| format!("failed to parse config file '{}'", args.config.display()))?;
    let loader = ConfigLoader::new(ledger.clone(), args.config.clone(), args.config_interval.into());
    loader.load_once().await.context("initial config load failed")?;

    let (shutdown_handle, shutdown) = shutdown::new();

    let reaper = Reaper::new(ledger.clone(), config.reaper_policies.clone(), args.reaper_interval.into());
    tokio::spawn(reaper.run(shutdown.clone()));

    let updater = DynamicResourceUpdater::new(ledger.clone(), clock.clone(), args.updater_interval.into());
    tokio::spawn(updater.run(shutdown.clone()));

    tokio::spawn(loader.run(shutdown.clone()));

    let gc_ledger = ledger.clone();
    let gc_interval: Duration = args.request_gc_interval.into();
    let gc_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(gc_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => gc_ledger.gc_requests(),
                _ = gc_shutdown.wait() => {
                    tracing::info!("request queue GC stopping");
                    return;
                }
            }
        }
    });

    let app_state = web::Data::new(AppState::new(ledger));
    app_state.mark_hydrated();

    let bind_addr = args.bind;
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(bind_addr)
    .with_context(|| format!("failed to bind '{}'", bind_addr))?
    .run();

    let server_handle = server.handle();
    tokio::spawn(shutdown_handle.wait_for_ctrl_c());
    let stop_on_shutdown = shutdown.clone();
    tokio::spawn(async move {
        stop_on_shutdown.wait().await;
        tracing::info!("stopping HTTP server");
        server_handle.stop(true).await;
    });

    server.await.context("HTTP server terminated unexpectedly")?;
    Ok(())
}
