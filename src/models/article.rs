use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical article record produced by the fetch stage. Field names are
/// stable regardless of which API schema version the raw payload used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub article_id: Option<String>,
    /// Deduplication key. Records without a URL bypass deduplication.
    pub url: Option<String>,
    pub title: Option<String>,
    /// Full article text, the preferred content field.
    pub body: Option<String>,
    /// Shorter content field used by older API schema versions.
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: Option<String>,
    pub source_uri: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl Article {
    /// The active content field: `body` when present, `description` otherwise.
    pub fn content(&self) -> Option<&str> {
        self.body.as_deref().or(self.description.as_deref())
    }
}
