//! # Intent Replay
//!
//! Feeds recorded intents into a cart store and prints the resulting cart.
//!
//! ## Usage
//! ```bash
//! # Replay a recording against the configured store
//! cargo run -p basket-store --bin replay -- session.jsonl
//!
//! # Read from stdin, keep nothing on disk
//! cat session.jsonl | cargo run -p basket-store --bin replay -- --memory
//!
//! # Replay into a specific database file
//! cargo run -p basket-store --bin replay -- --db ./basket_dev.db session.jsonl
//! ```
//!
//! ## Input Format
//! One intent per line, in the same shape the UI dispatches:
//! ```text
//! {"type":"ADD_ITEM","payload":{"productId":"p1","quantity":2}}
//! {"type":"UPDATE_QUANTITY","payload":{"productId":"p1","quantity":5}}
//! # comments and blank lines are skipped
//! {"type":"REMOVE_ITEM","payload":{"productId":"p1"}}
//! ```
//!
//! Logs go to stderr (`RUST_LOG` controls the filter); the final cart is
//! printed to stdout as JSON.

use basket_core::Intent;
use basket_store::{CartStore, StorageBackend, StoreConfig};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut key: Option<String> = None;
    let mut memory = false;
    let mut input: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--key" | "-k" => {
                if i + 1 < args.len() {
                    key = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--memory" | "-m" => memory = true,
            "--help" | "-h" => {
                println!("Basket Intent Replay");
                println!();
                println!("Usage: replay [OPTIONS] [FILE]");
                println!();
                println!("Reads JSON intents, one per line, from FILE (or stdin when FILE is");
                println!("missing or '-') and prints the final cart as JSON.");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Store config file (default: platform config dir)");
                println!("  -d, --db <PATH>      Use the sqlite backend at PATH");
                println!("  -k, --key <KEY>      Storage key (default: cart)");
                println!("  -m, --memory         Do not persist anything");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => input = Some(other.to_string()),
        }
        i += 1;
    }

    let mut config = StoreConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.database_path = Some(path);
    }
    if memory {
        config.storage.backend = StorageBackend::Memory;
    }
    if let Some(key) = key {
        config.storage.key = key;
    }

    let store = CartStore::open_from_config(&config).await?;

    let reader: Box<dyn BufRead> = match input.as_deref() {
        None | Some("-") => Box::new(BufReader::new(io::stdin())),
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
    };

    let mut applied = 0usize;
    let mut skipped = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<Intent>(trimmed) {
            Ok(intent) => {
                store.dispatch(intent);
                applied += 1;
            }
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed intent");
                skipped += 1;
            }
        }
    }

    store.shutdown().await?;

    info!(
        applied,
        skipped,
        revision = store.revision(),
        "Replay finished"
    );

    println!("{}", serde_json::to_string_pretty(store.state().as_ref())?);

    Ok(())
}

/// Initializes the tracing subscriber for logging.
///
/// Default filter: info for everything, debug for basket crates, warn for sqlx.
/// Override with the `RUST_LOG` environment variable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,basket_store=debug,basket_db=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
