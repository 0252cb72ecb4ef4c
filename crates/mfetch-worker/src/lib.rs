//! Download-and-transcode job orchestration.
//!
//! This crate provides:
//! - The job orchestrator state machine for audio and video jobs
//! - Event sinks that carry status events back to a client
//! - Structured job logging and job metrics
//! - Worker configuration and error types

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod sink;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::{Collaborators, DownloadJob, JobOrchestrator, PipelineSettings};
pub use sink::{ChannelSink, EventSink};
