//! In-memory diagram cache.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ports::cache::{CachedDiagram, DiagramCache};

/// Diagram cache backed by a map keyed on `(username, repo)`.
#[derive(Debug, Default)]
pub struct MemoryDiagramCache {
    entries: Mutex<HashMap<(String, String), CachedDiagram>>,
}

impl MemoryDiagramCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached repositories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagramCache for MemoryDiagramCache {
    fn get(
        &self,
        username: &str,
        repo: &str,
    ) -> Result<Option<CachedDiagram>, Box<dyn std::error::Error + Send + Sync>> {
        let entries = self.entries.lock().map_err(|_| "memory cache lock poisoned")?;
        Ok(entries.get(&(username.to_string(), repo.to_string())).cloned())
    }

    fn put(
        &self,
        username: &str,
        repo: &str,
        entry: &CachedDiagram,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut entries = self.entries.lock().map_err(|_| "memory cache lock poisoned")?;
        entries.insert((username.to_string(), repo.to_string()), entry.clone());
        Ok(())
    }
}
