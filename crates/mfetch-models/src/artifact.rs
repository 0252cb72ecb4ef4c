//! Artifact records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// How long a finished artifact stays retrievable.
pub const ARTIFACT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Opaque retrieval id of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    /// Generate a new random artifact ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a client-supplied id. Only well-formed UUIDs are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(|u| Self(u.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A finished artifact registered in the artifact store.
///
/// Records are never updated in place; they are only inserted and deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// Retrieval id
    pub id: ArtifactId,
    /// File name under the artifacts directory
    pub filename: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a record with a fresh id, created now.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            id: ArtifactId::new(),
            filename: filename.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the record is older than `ttl` at `now`.
    ///
    /// A record exactly `ttl` old is still live.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age_ms = now.signed_duration_since(self.created_at).num_milliseconds();
        age_ms > ttl.as_millis() as i64
    }

    /// Retrieval path handed to clients.
    pub fn file_url(&self) -> String {
        format!("/downloads/{}", self.id)
    }
}
