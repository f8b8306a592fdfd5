use std::sync::Arc;

use focusflow_core::storage::data_dir;
use focusflow_core::{Config, Database, RecordStore, SessionStore, SettingsStore, StatsEngine};

/// Opened database plus the configuration it was opened with.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
}

impl AppContext {
    pub fn open(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let path = config.storage.database_path(&data_dir()?);
        tracing::debug!(path = %path.display(), "opening database");
        let store: Arc<dyn RecordStore> = Arc::new(Database::open_at(&path)?);
        Ok(Self { config, store })
    }

    pub fn settings(&self) -> SettingsStore {
        SettingsStore::new(self.store.clone())
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.store.clone())
    }

    pub fn stats(&self) -> StatsEngine {
        StatsEngine::new(self.store.clone(), self.sessions())
    }
}
