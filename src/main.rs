//! Hawaii Climate API - Main Service
//!
//! Serves the read-only climate API:
//! 1. Loads service.toml (or built-in defaults)
//! 2. Verifies the measurement and station tables are reachable
//! 3. Starts the HTTP endpoint with one data-store session per worker
//!
//! Usage:
//!   cargo run --release                              # service.toml or defaults
//!   cargo run --release -- --config prod.toml        # explicit config file
//!   cargo run --release -- --port 8080               # override server.port
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string
//!   RUST_LOG     - log filter (default: info)

use climate_service::config;
use climate_service::db;
use climate_service::endpoint;
use climate_service::error::QueryError;
use climate_service::query::{self, QueryLayer};
use climate_service::store::PgStore;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🌺 Hawaii Climate API");
    println!("=====================\n");

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut port_override: Option<u16> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--port" if i + 1 < args.len() => {
                match args[i + 1].parse() {
                    Ok(port) => port_override = Some(port),
                    Err(_) => {
                        eprintln!("Error: --port requires a port number, got {}", args[i + 1]);
                        std::process::exit(1);
                    }
                }
                i += 2;
            }
            _ => {
                eprintln!("Unknown or incomplete argument: {}", args[i]);
                eprintln!("Usage: {} [--config PATH] [--port PORT]", args[0]);
                std::process::exit(1);
            }
        }
    }

    let mut config = match config::load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            if let Some(source) = std::error::Error::source(&e) {
                log::error!("  caused by: {}", source);
            }
            std::process::exit(1);
        }
    };
    if let Some(port) = port_override {
        config.server.port = port;
    }

    // Fail fast on a missing or unreadable dataset before accepting requests.
    let db_url = match db::database_url() {
        Ok(url) => url,
        Err(e) => {
            eprintln!("\n❌ {}\n", e);
            std::process::exit(1);
        }
    };
    let timeout_ms = config.query.timeout_ms;
    let mut store = match db::connect_and_verify(timeout_ms) {
        Ok(client) => PgStore::new(client),
        Err(e) => {
            eprintln!("\n❌ {}\n", e);
            std::process::exit(1);
        }
    };
    log::info!("Dataset tables verified ({})", db::REQUIRED_TABLES.join(", "));

    let queries = QueryLayer::new(config.query.anchor_date);
    match queries.resolve_anchor(&mut store) {
        Ok(Some(anchor)) => log::info!(
            "Anchor {} resolves to {}; last-year window starts {}",
            queries.anchor(),
            anchor,
            query::window_start(anchor)
        ),
        Ok(None) => log::warn!("Anchor {} has no dataset rows to resolve against", queries.anchor()),
        Err(e) => log::warn!("Could not resolve anchor date: {}", e),
    }
    drop(store);

    let server = match endpoint::bind(&config.server.bind, config.server.port) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    println!("📡 HTTP endpoint listening on http://{}:{}", config.server.bind, config.server.port);
    for route in endpoint::ROUTES {
        println!("   GET {}", route);
    }
    println!();
    log::info!("Serving with {} workers, query timeout {} ms", config.server.workers, timeout_ms);

    endpoint::serve(server, config.server.workers, queries, move || {
        PgStore::connect(&db_url, timeout_ms).map_err(QueryError::from)
    });
}
