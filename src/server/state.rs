//! Application state management

use std::path::PathBuf;

use crate::error::Result;
use crate::store::ResultStore;
use crate::training::{TrainEngine, TrainerConfig};

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub store: ResultStore,
    pub engine: TrainEngine,
}

impl AppState {
    /// Open the persistent store under the configured data directory
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = ResultStore::open(&config.data_dir)?;
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: ServerConfig, store: ResultStore) -> Self {
        Self {
            config,
            store,
            engine: TrainEngine::new(TrainerConfig::default()),
        }
    }

    /// Directory holding uploaded CSV files
    pub fn datasets_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.data_dir).join("datasets")
    }

    /// Directory holding serialized pipelines
    pub fn models_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.models_dir)
    }
}
