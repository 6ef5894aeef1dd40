//! Locations under the trailmark data directory.
//!
//! ```text
//! ~/.trailmark/
//!   config.toml
//!   slots.db
//!   logs/trailmark.log
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

const DIR_NAME: &str = ".trailmark";

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Pin the data directory for this process. `None` keeps `~/.trailmark`.
///
/// Only the first call has an effect; call it before any other function here.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let path = custom_path.unwrap_or_else(home_data_dir);
    if let Err(rejected) = DATA_DIR.set(path) {
        tracing::debug!(
            rejected = %rejected.display(),
            current = %data_dir().display(),
            "Data directory already pinned"
        );
    }
}

fn home_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(DIR_NAME),
        None => PathBuf::from(DIR_NAME),
    }
}

pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(home_data_dir)
}

/// Default SQLite slot store shared by processes on this machine
pub fn store_path() -> PathBuf {
    data_dir().join("slots.db")
}

pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

pub fn log_file_path() -> PathBuf {
    logs_dir().join("trailmark.log")
}

pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Create the logs directory if needed and return the log file path.
pub fn ensure_log_file_path() -> io::Result<PathBuf> {
    std::fs::create_dir_all(logs_dir())?;
    Ok(log_file_path())
}
