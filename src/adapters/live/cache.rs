//! Live diagram cache storing one YAML file per repository.

use std::path::PathBuf;

use crate::ports::cache::{CachedDiagram, DiagramCache};

/// Diagram cache rooted at a directory:
///
/// ```text
/// <root>/
///   └── <username>/
///       └── <repo>.yaml
/// ```
pub struct FileDiagramCache {
    root: PathBuf,
}

impl FileDiagramCache {
    /// Creates a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(
        &self,
        username: &str,
        repo: &str,
    ) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
        for part in [username, repo] {
            if part.is_empty() || part.starts_with('.') || part.contains(['/', '\\']) {
                return Err(format!("Invalid cache key component: {part:?}").into());
            }
        }
        Ok(self.root.join(username).join(format!("{repo}.yaml")))
    }
}

impl DiagramCache for FileDiagramCache {
    fn get(
        &self,
        username: &str,
        repo: &str,
    ) -> Result<Option<CachedDiagram>, Box<dyn std::error::Error + Send + Sync>> {
        let path = self.entry_path(username, repo)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let entry = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse cached diagram {}: {e}", path.display()))?;
        Ok(Some(entry))
    }

    fn put(
        &self,
        username: &str,
        repo: &str,
        entry: &CachedDiagram,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let path = self.entry_path(username, repo)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(entry)?;
        Ok(std::fs::write(&path, yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn stores_entries_per_repository() {
        let dir = std::env::temp_dir().join("gitdiagram_file_cache_test");
        let _ = std::fs::remove_dir_all(&dir);
        let cache = FileDiagramCache::new(&dir);
        let stamp = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let entry = CachedDiagram {
            diagram: "flowchart TD\n  A --> B".into(),
            explanation: "two parts".into(),
            used_own_key: true,
            last_successful_update: stamp,
        };

        assert_eq!(cache.get("acme", "widgets").unwrap(), None);
        cache.put("acme", "widgets", &entry).unwrap();
        assert!(dir.join("acme").join("widgets.yaml").exists());
        assert_eq!(cache.get("acme", "widgets").unwrap(), Some(entry));
        assert_eq!(cache.last_generated("acme", "widgets").unwrap(), Some(stamp));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_path_traversal_keys() {
        let cache = FileDiagramCache::new(std::env::temp_dir().join("gitdiagram_cache_keys"));
        assert!(cache.get("..", "widgets").is_err());
        assert!(cache.get("acme", "a/b").is_err());
    }
}
