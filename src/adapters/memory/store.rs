//! In-memory key-value store.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ports::store::KeyValueStore;

/// Key-value store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    #[must_use]
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = entries.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Self { entries: Mutex::new(entries) }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let entries = self.entries.lock().map_err(|_| "memory store lock poisoned")?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut entries = self.entries.lock().map_err(|_| "memory store lock poisoned")?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut entries = self.entries.lock().map_err(|_| "memory store lock poisoned")?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("openai_key").unwrap(), None);
        store.set("openai_key", "sk-1").unwrap();
        assert_eq!(store.get("openai_key").unwrap().as_deref(), Some("sk-1"));
        store.remove("openai_key").unwrap();
        store.remove("openai_key").unwrap();
        assert_eq!(store.get("openai_key").unwrap(), None);
    }
}
