//! Background service expiring finished artifacts.
//!
//! The first cycle runs as soon as the service starts, then once per
//! interval. Each cycle:
//! - Removes artifact records older than the TTL together with their files
//! - Purges staging files left behind by a crashed process

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mfetch_media::StagingArea;
use mfetch_models::ARTIFACT_TTL;
use mfetch_storage::{ArtifactStore, SweepReport};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::metrics;

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub artifacts: SweepReport,
    pub staging_purged: usize,
}

/// Periodic artifact sweeper.
pub struct ArtifactSweeper {
    store: Arc<ArtifactStore>,
    staging: StagingArea,
    interval: Duration,
    ttl: Duration,
}

impl ArtifactSweeper {
    pub fn new(store: Arc<ArtifactStore>, staging: StagingArea, interval: Duration) -> Self {
        Self {
            store,
            staging,
            interval,
            ttl: ARTIFACT_TTL,
        }
    }

    /// Start the background sweep loop.
    ///
    /// This function runs indefinitely and should be spawned as a background task.
    pub async fn run(&self) {
        info!("Starting artifact sweeper (interval: {:?}, ttl: {:?})", self.interval, self.ttl);

        // The first tick completes immediately
        let mut ticker = interval(self.interval);

        loop {
            ticker.tick().await;

            if let Err(e) = self.run_once().await {
                metrics::record_sweep_failure();
                error!("Artifact sweep error: {:#}", e);
            }
        }
    }

    /// Run a single sweep cycle.
    pub async fn run_once(&self) -> anyhow::Result<SweepOutcome> {
        let artifacts = self.store.sweep(Utc::now(), self.ttl).await?;

        // Staging purge failures are only logged
        let staging_purged = match self.staging.purge_stale(self.ttl).await {
            Ok(count) => count,
            Err(e) => {
                warn!(dir = %self.staging.dir().display(), error = %e, "Staging purge failed");
                0
            }
        };

        metrics::record_sweep(artifacts.removed, staging_purged);

        if artifacts.removed > 0 || staging_purged > 0 || artifacts.files_failed > 0 {
            info!(
                scanned = artifacts.scanned,
                removed = artifacts.removed,
                files_missing = artifacts.files_missing,
                files_failed = artifacts.files_failed,
                staging_purged,
                "Artifact sweep finished"
            );
        }

        Ok(SweepOutcome {
            artifacts,
            staging_purged,
        })
    }
}
