//! Artifact store.
//!
//! This crate provides:
//! - A persisted JSON index of finished artifacts (id → filename, creation time)
//! - Serialized read-modify-write updates with atomic file replacement
//! - TTL sweeps that delete expired records together with their files

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{ArtifactStore, SweepReport};
