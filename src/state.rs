//! Application state: the learner session, its on-disk store, and the exercise generator.
//!
//! The process serves a single learner on a single device, so there is exactly
//! one `Session`, guarded by an async RwLock. Generation runs outside that lock.

use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::config::{load_app_config_from_env, AppConfig, ConfigError};
use crate::gemini::Gemini;
use crate::generator::Generator;
use crate::session::Session;
use crate::store::{FileStore, ProgressStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot open data directory: {0}")]
    Store(#[from] StoreError),
}

pub struct AppState {
    pub session: RwLock<Session<FileStore>>,
    pub generator: Generator<Gemini>,
}

impl AppState {
    pub fn new(cfg: &AppConfig, gemini: Gemini, data_dir: impl Into<PathBuf>) -> Result<Self, StartupError> {
        let store = ProgressStore::new(FileStore::new(data_dir)?);
        Ok(Self {
            session: RwLock::new(Session::load(store)),
            generator: Generator::new(gemini, cfg),
        })
    }

    /// Build state from env: load config, open the data directory, init the Gemini client.
    /// A missing API key is an error, not a degraded mode.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, StartupError> {
        let cfg = load_app_config_from_env();
        let gemini = Gemini::from_env(&cfg.generation)?;
        info!(target: "nahw_backend", base_url = %gemini.base_url, model = %gemini.model, max_attempts = cfg.generation.max_attempts, "Gemini enabled");

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into());
        let state = Self::new(&cfg, gemini, &data_dir)?;
        info!(target: "nahw_backend", %data_dir, "Data directory opened");
        Ok(state)
    }
}
