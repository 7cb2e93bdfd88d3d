//! Diagram cache port.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A finished diagram stored for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDiagram {
    /// Mermaid diagram source.
    pub diagram: String,
    /// Explanation the diagram was derived from.
    pub explanation: String,
    /// Whether the generation ran on the user's own AI key.
    pub used_own_key: bool,
    /// When the diagram was last (re)generated.
    pub last_successful_update: DateTime<Utc>,
}

/// Stores generated diagrams keyed by `(username, repo)`.
pub trait DiagramCache: Send + Sync {
    /// Looks up the cached diagram for a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read.
    fn get(
        &self,
        username: &str,
        repo: &str,
    ) -> Result<Option<CachedDiagram>, Box<dyn std::error::Error + Send + Sync>>;

    /// Stores (or replaces) the diagram for a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    fn put(
        &self,
        username: &str,
        repo: &str,
        entry: &CachedDiagram,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Returns when the repository's diagram was last generated.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read.
    fn last_generated(
        &self,
        username: &str,
        repo: &str,
    ) -> Result<Option<DateTime<Utc>>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.get(username, repo)?.map(|entry| entry.last_successful_update))
    }
}
