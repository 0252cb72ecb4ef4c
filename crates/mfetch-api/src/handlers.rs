//! Request handlers.

pub mod downloads;
pub mod health;

pub use downloads::*;
pub use health::*;
