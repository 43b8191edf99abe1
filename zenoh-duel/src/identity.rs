//! Durable local identity
//!
//! The local peer id is generated once and then reused across process restarts,
//! so that a player keeps the same address for friends to connect to.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::PeerId;

/// Key under which the local peer id is stored
pub const IDENTITY_KEY: &str = "tetris-peerId";

/// Durable key-value store surviving process restarts
pub trait IdentityStore {
    /// Read a value, `None` if the key was never written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Identity store backed by a small JSON object on disk
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

/// Volatile identity store, for tests and throwaway sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    entries: HashMap<String, String>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Load the persisted peer id, generating and persisting a new one on first run
///
/// A stored value that is not a valid peer id is replaced.
pub fn initialize_identity(store: &mut impl IdentityStore) -> Result<PeerId> {
    if let Some(stored) = store.get(IDENTITY_KEY)? {
        match PeerId::from_name(stored) {
            Ok(id) => {
                tracing::info!("Reusing stored peer id '{}'", id);
                return Ok(id);
            }
            Err(e) => {
                tracing::warn!("Stored peer id is invalid, generating a new one: {}", e);
            }
        }
    }

    let id = PeerId::generate();
    store.set(IDENTITY_KEY, id.as_str())?;
    tracing::info!("Generated new peer id '{}'", id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("zenoh-duel-test-{}", uuid::Uuid::new_v4()))
            .join("identity.json")
    }

    #[test]
    fn test_memory_store_reuses_identity() {
        let mut store = MemoryIdentityStore::new();
        let first = initialize_identity(&mut store).unwrap();
        let second = initialize_identity(&mut store).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.get(IDENTITY_KEY).unwrap().as_deref(), Some(first.as_str()));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let path = temp_path();

        let first = {
            let mut store = FileIdentityStore::new(&path);
            initialize_identity(&mut store).unwrap()
        };
        // A fresh store on the same file stands in for a process restart
        let second = {
            let mut store = FileIdentityStore::new(&path);
            initialize_identity(&mut store).unwrap()
        };
        assert_eq!(first, second);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let path = temp_path();
        let mut store = FileIdentityStore::new(&path);
        store.set("theme", "dark").unwrap();
        initialize_identity(&mut store).unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_invalid_stored_identity_is_replaced() {
        let mut store = MemoryIdentityStore::new();
        store.set(IDENTITY_KEY, "bad/id").unwrap();
        let id = initialize_identity(&mut store).unwrap();
        assert_ne!(id.as_str(), "bad/id");
        assert_eq!(store.get(IDENTITY_KEY).unwrap().as_deref(), Some(id.as_str()));
    }
}
