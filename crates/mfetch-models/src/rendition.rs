//! Rendition information returned to clients.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Placeholder title used when the source has none.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Placeholder artist used when the source has none.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Normalized description of what a source offers.
///
/// Recomputed for every request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenditionInfo {
    /// Unique quality labels, highest resolution first
    pub qualities: Vec<String>,
    /// Preferred thumbnail
    pub thumbnail_url: Option<String>,
    pub title: String,
    pub artist: String,
}

impl RenditionInfo {
    /// Whether the given quality label is offered.
    pub fn offers_quality(&self, label: &str) -> bool {
        self.qualities.iter().any(|q| q == label)
    }

    /// Best offered quality label.
    pub fn best_quality(&self) -> Option<&str> {
        self.qualities.first().map(String::as_str)
    }
}
