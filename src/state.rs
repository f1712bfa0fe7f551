//! Application state: the document store, module catalog, and the services built on them.
//!
//! This module owns:
//!   - the shared document store (in-memory by default)
//!   - the module catalog (from TOML or built-in seeds)
//!   - the progress accessor, gamification engine and score records
//!   - the event recorder, bound to the session created at startup

use std::sync::Arc;

use tracing::{info, instrument};

use crate::catalog::ModuleCatalog;
use crate::config::{load_app_config_from_env, AppConfig};
use crate::events::{EventRecorder, SessionContext};
use crate::gamification::{BadgePolicy, Gamification};
use crate::progress::ProgressStore;
use crate::records::ScoreRecords;
use crate::store::{DocumentStore, MemoryStore};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ModuleCatalog>,
    pub progress: ProgressStore,
    pub gamification: Gamification,
    pub records: ScoreRecords,
    pub recorder: EventRecorder,
}

impl AppState {
    /// Build state from env: load config, build the catalog, open an in-memory store.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_app_config_from_env().unwrap_or_default();
        Self::with_store(Arc::new(MemoryStore::new()), cfg)
    }

    /// Wire every service over the given store.
    pub fn with_store(store: Arc<dyn DocumentStore>, cfg: AppConfig) -> Self {
        let catalog = Arc::new(ModuleCatalog::from_config(&cfg.modules));
        let progress = ProgressStore::new(store.clone());
        let gamification = Gamification::new(
            progress.clone(),
            BadgePolicy::from_config(&cfg.badges),
            cfg.points.clone(),
        );
        let records = ScoreRecords::new(store.clone(), progress.clone(), catalog.clone());

        // One session per process launch.
        let session = SessionContext::generate();
        info!(target: "gridwise", session = %session.id(), per_correct = cfg.points.per_correct_answer, completion_bonus = cfg.points.module_completion_bonus, "Telemetry session started");
        let recorder = EventRecorder::new(store, progress.clone(), session);

        Self { catalog, progress, gamification, records, recorder }
    }
}
