use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "trailmark")]
#[command(version, about = "Inspect trailmark traces and shared session records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ~/.trailmark/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (defaults to ~/.trailmark)
    #[arg(long, global = true, env = "TRAILMARK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a trace into timed events, one JSON object per line
    Decode { trace: String },

    /// Parse a slot record
    Slot { record: String },

    /// Parse an epoch record
    Epoch { record: String },

    /// Show the space token a fresh trace emits for an identifier
    Hash { identifier: String },

    /// Dump every live entry of a SQLite slot store
    Slots {
        /// Store file (defaults to ~/.trailmark/slots.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}
