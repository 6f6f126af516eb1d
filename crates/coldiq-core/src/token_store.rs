//! Session token storage.
//!
//! The mail agent only ever reads the token (`TokenStore::get`); issuing and
//! refreshing it happen elsewhere. `SledTokenStore` is the persistent store on the
//! local filesystem and also exposes the write side the CLI uses to save or forget a
//! token. An empty stored value reads as "no token".

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Read-only key/value access to previously stored credentials.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Value stored under `key`, or `None` when absent or empty.
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;
}

/// Sled-backed token store (one small tree on the local filesystem).
pub struct SledTokenStore {
    db: sled::Db,
}

impl SledTokenStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let db = sled::open(path.as_ref())?;
        Ok(Self { db })
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        self.db.flush()?;
        debug!(target: "coldiq::core", key, "token store value written");
        Ok(())
    }

    /// Remove every key in `keys`. Missing keys are ignored.
    pub fn clear(&self, keys: &[&str]) -> CoreResult<()> {
        for key in keys {
            self.db.remove(key.as_bytes())?;
        }
        self.db.flush()?;
        debug!(target: "coldiq::core", count = keys.len(), "token store keys cleared");
        Ok(())
    }

    fn read(&self, key: &str) -> CoreResult<Option<String>> {
        let Some(raw) = self.db.get(key.as_bytes())? else {
            return Ok(None);
        };
        let value = String::from_utf8(raw.to_vec()).map_err(|_| CoreError::Encoding(key.to_string()))?;
        Ok(Some(value).filter(|v| !v.trim().is_empty()))
    }
}

#[async_trait]
impl TokenStore for SledTokenStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        self.read(key)
    }
}

/// In-memory token store for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: a store holding a single `key -> token` entry.
    pub fn with_token(key: &str, token: &str) -> Self {
        let store = Self::new();
        store.insert(key, token);
        store
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).filter(|v| !v.trim().is_empty()).cloned())
    }
}
