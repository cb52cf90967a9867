//! Card Pricing - marketplace pricing backend
//!
//! Serves the pricing REST API and runs the background price monitor.
//! The card index is populated with `--import <file>` from a JSON dump of
//! the upstream card catalogue.

use card_pricing::{importer, init_schema, monitor, web, PricingService, ServiceConfig};
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Card marketplace pricing backend
#[derive(Parser, Debug)]
#[command(name = "card_pricing")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value_t = default_db_path())]
    database: String,

    /// Port for the REST API
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Import a JSON card dump into the index, then exit
    #[arg(long)]
    import: Option<PathBuf>,

    /// Base URL of the external catalogue API
    #[arg(long)]
    catalogue_url: Option<String>,

    /// Base URL of the external market data API
    #[arg(long)]
    market_url: Option<String>,

    /// Price monitor interval in hours
    #[arg(long, default_value_t = 4)]
    monitor_interval_hours: u64,

    /// Disable the background price monitor
    #[arg(long, default_value_t = false)]
    no_monitor: bool,
}

/// Returns the default database path: <data dir>/card_pricing/cards.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("card_pricing")
        .join("cards.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let db_path = PathBuf::from(&args.database);

    log::info!("Starting card_pricing...");
    log::info!("Database path: {}", db_path.display());

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create database directory: {}", e);
                std::process::exit(1);
            }
            log::info!("Created directory: {}", parent.display());
        }
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => {
            log::info!("Opened database: {}", db_path.display());
            conn
        }
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_schema(&conn) {
        log::error!("Failed to initialize database schema: {}", e);
        std::process::exit(1);
    }

    // One-shot import mode
    if let Some(path) = &args.import {
        match importer::import_file(&mut conn, path) {
            Ok(count) => {
                log::info!("Imported {} cards from {}", count, path.display());
                return;
            }
            Err(e) => {
                log::error!("Import failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut config = ServiceConfig::default();
    if let Some(url) = args.catalogue_url {
        config.catalogue_base_url = url;
    }
    if let Some(url) = args.market_url {
        config.market_base_url = url;
    }

    let db = Arc::new(Mutex::new(conn));
    let service = match PricingService::new(db, config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            log::error!("Failed to construct pricing service: {}", e);
            std::process::exit(1);
        }
    };

    if !args.no_monitor {
        let monitor_service = Arc::clone(&service);
        tokio::spawn(async move {
            monitor::run(monitor_service, args.monitor_interval_hours).await;
        });
        log::info!(
            "Price monitor scheduled every {} hour(s)",
            args.monitor_interval_hours
        );
    }

    if let Err(e) = web::serve(service, args.port).await {
        log::error!("Web server error: {}", e);
        std::process::exit(1);
    }
}
