//! Route gate
//!
//! Resolves request paths against a declarative route table and enforces
//! per-route filters before handing the target to the application.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ routing table ──▶ filters ──▶ 200 dispatch JSON
//!                        │                 │              │
//!                        │                 ▼              └──────▶ 303 redirect
//!                        │           segment store
//!                        │           + locale
//!                        ▼
//!                   config watcher ──▶ rebuilt table (atomic swap)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use route_gate::config::{build_route_table, load_config, ConfigWatcher};
use route_gate::http::{AppState, HttpServer};
use route_gate::lifecycle::{spawn_signal_listener, Shutdown};
use route_gate::observability::{logging, metrics};
use route_gate::store::MemoryStore;

#[derive(Parser)]
#[command(name = "route-gate")]
#[command(about = "Declarative URI routing and request filtering", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "route-gate.toml")]
    config: PathBuf,

    /// Do not reload the route table when the file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(config = ?args.config, "route-gate v0.1.0 starting");

    let table = Arc::new(build_route_table(&config)?);
    tracing::info!(
        bind_address = %config.server.bind_address,
        routes = table.len(),
        pattern_mode = ?config.routing.pattern_mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(MemoryStore::from_tables(&config.store.tables));
    let state = AppState::new(table, store, &config.routing.default_locale);
    let server = HttpServer::new(&config, state);

    // The watcher stops when dropped.
    let _watcher = if args.no_watch {
        None
    } else {
        let (watcher, updates) = ConfigWatcher::new(&args.config);
        server.spawn_reloader(updates);
        match watcher.run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                None
            }
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
