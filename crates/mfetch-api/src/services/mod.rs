//! Background services.

pub mod sweeper;

pub use sweeper::ArtifactSweeper;
