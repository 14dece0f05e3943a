//! Dataset Summary
//!
//! Prints what the API will serve: station and measurement counts, the
//! date span of the data, the most active station and the last-year window
//! the configured anchor produces.
//!
//! Usage:
//!   cargo run --bin dataset_summary
//!   cargo run --bin dataset_summary -- --config prod.toml
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string

use climate_service::config;
use climate_service::db;
use climate_service::query::{self, QueryLayer};
use climate_service::store::PgStore;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("📊 Hawaii Climate Dataset Summary");
    println!("=================================\n");

    let args: Vec<String> = std::env::args().collect();
    let config_path = match args.as_slice() {
        [_] => None,
        [_, flag, path] if flag == "--config" => Some(PathBuf::from(path)),
        _ => {
            eprintln!("Usage: {} [--config PATH]", args[0]);
            std::process::exit(1);
        }
    };

    let config = config::load_config(config_path.as_deref())?;

    let mut store = db::connect_and_verify(config.query.timeout_ms)
        .map(PgStore::new)
        .unwrap_or_else(|e| {
            eprintln!("\n{}\n", e);
            std::process::exit(1);
        });

    let queries = QueryLayer::new(config.query.anchor_date);
    let overview = queries.dataset_overview(&mut store)?;

    println!("  Stations:      {}", overview.station_count);
    println!("  Measurements:  {}", overview.measurement_count);
    match (overview.first_date, overview.last_date) {
        (Some(first), Some(last)) => println!("  Date span:     {} → {}", first, last),
        _ => println!("  Date span:     (no measurements)"),
    }
    match &overview.most_active {
        Some(station) => println!("  Most active:   {} ({} rows)", station.station_id, station.count),
        None => println!("  Most active:   (none)"),
    }

    println!();
    println!("  Anchor:        {}", queries.anchor());
    match queries.resolve_anchor(&mut store)? {
        Some(anchor) => {
            println!("  Window:        {} → {}", query::window_start(anchor), anchor);
            let precipitation = queries.precipitation_last_year(&mut store)?;
            let temperatures = queries.most_active_station_temps(&mut store)?;
            println!("  Precipitation rows in window: {}", precipitation.len());
            println!("  Most-active temperature rows: {}", temperatures.len());
        }
        None => println!("  Window:        (empty dataset)"),
    }

    Ok(())
}
