//! Application state.

use std::sync::Arc;

use mfetch_media::StagingArea;
use mfetch_storage::ArtifactStore;
use mfetch_worker::{JobOrchestrator, WorkerConfig, WorkerResult};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub orchestrator: JobOrchestrator,
    pub store: Arc<ArtifactStore>,
    pub staging: StagingArea,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig, worker: &WorkerConfig) -> WorkerResult<Self> {
        let orchestrator = JobOrchestrator::from_config(worker).await?;
        Ok(Self::from_orchestrator(config, orchestrator))
    }

    /// Wrap an already assembled pipeline.
    pub fn from_orchestrator(config: ApiConfig, orchestrator: JobOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::clone(orchestrator.store()),
            staging: orchestrator.staging().clone(),
            orchestrator,
        }
    }
}
