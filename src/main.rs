mod cli;

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{Cli, Commands};
use serde_json::json;
use trailmark::codec::{encode_space, IdentifierTable};
use trailmark::{decode, util, Config, EpochRecord, SlotRecord, SlotStore, SqliteStore, SystemClock};

fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());
    init_logging();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    match cli.command {
        Commands::Decode { trace } => {
            for event in decode(&trace) {
                let line = json!({
                    "kind": event.kind,
                    "payload": event.payload,
                    "offset_ticks": event.offset_ticks,
                    "offset_ms": event.offset_ticks.saturating_mul(config.tick_ms),
                });
                println!("{line}");
            }
        }
        Commands::Slot { record } => {
            let parsed = SlotRecord::parse(&record)
                .ok_or_else(|| anyhow!("Malformed slot record: {record}"))?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Commands::Epoch { record } => {
            let parsed = EpochRecord::parse(&record)
                .ok_or_else(|| anyhow!("Malformed epoch record: {record}"))?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Commands::Hash { identifier } => {
            let token = encode_space(&identifier, &config.aliases, &mut IdentifierTable::new());
            println!("{token}");
        }
        Commands::Slots { db } => {
            let clock = Arc::new(SystemClock);
            let store = match db {
                Some(path) => SqliteStore::open(path, clock)?,
                None => SqliteStore::open_default(clock)?,
            };
            for (key, value) in store.scan_all(&config.key_prefix)? {
                println!("{}", json!({ "key": key, "value": value }));
            }
        }
    }

    Ok(())
}

/// Log to ~/.trailmark/logs/trailmark.log. Inspection commands still work
/// when the log file cannot be opened.
fn init_logging() {
    let Ok(path) = util::ensure_log_file_path() else {
        return;
    };
    let Ok(log_file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}
