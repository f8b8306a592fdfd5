//! Persistence for settings, sessions and stats.
//!
//! Every store in this crate talks to a [`RecordStore`]: a minimal
//! collection/record interface over JSON objects. [`Database`] is the
//! SQLite implementation used by the CLI.

mod config;
pub mod database;
pub mod migrations;
pub mod sessions;
pub mod settings;

pub use config::{Config, LoggingConfig, StorageConfig, TimerConfig};
pub use database::Database;
pub use sessions::{Session, SessionDraft, SessionPatch, SessionStore};
pub use settings::{Settings, SettingsPatch, SettingsStore, SoundType};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, StorageError};

/// Field every stored record is keyed by.
pub const ID_FIELD: &str = "id";

/// Named group of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Completed sessions, many records.
    Sessions,
    /// User settings, singleton.
    Settings,
    /// Stats cache plus daily goal, singleton.
    Stats,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Sessions => "sessions",
            Collection::Settings => "settings",
            Collection::Stats => "stats",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence abstraction shared by all stores.
///
/// Records are JSON objects carrying their key in an `id` field.
/// Implementations may retry internally; callers never do.
pub trait RecordStore: Send + Sync {
    /// Fetch one record by id.
    fn read_record(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError>;

    /// Fetch every record of a collection in insertion order.
    fn read_records(&self, collection: Collection) -> Result<Vec<Value>, StorageError>;

    /// Insert or replace a record keyed by its `id`.
    ///
    /// A record without an `id` gets a fresh, time-ordered one. The stored
    /// record, id included, is returned.
    fn write_record(&self, collection: Collection, record: Value) -> Result<Value, StorageError>;

    /// Remove a record. Returns whether anything was removed.
    fn delete_record(&self, collection: Collection, id: &str) -> Result<bool, StorageError>;
}

/// Returns the FocusFlow data directory, creating it if needed.
///
/// `FOCUSFLOW_HOME` overrides the location outright. Otherwise this is
/// `~/.config/focusflow[-dev]/`, with the `-dev` suffix selected by
/// `FOCUSFLOW_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSFLOW_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSFLOW_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focusflow-dev")
            } else {
                base_dir.join("focusflow")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
