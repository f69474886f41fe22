//! Key/value persistence for browser-scoped client state.
//!
//! Vote choices live in `localStorage` (survive reloads), cached listing
//! responses in `sessionStorage` (survive in-session navigation). Both go
//! through [`KeyValueStore`] so the engine can run natively against
//! [`InMemoryStore`].

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("browser storage unavailable")]
    Unavailable,
    #[error("stored value corrupt: {0}")]
    Corrupt(String),
    #[error("storage error: {0}")]
    Io(String),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Reads and decodes a JSON value. Blank entries read as absent.
pub fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StorageError::Corrupt(e.to_string()))
}

pub fn save_json<T, S>(store: &mut S, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Io(e.to_string()))?;
    store.set(key, &raw)
}

/// Deterministic in-memory store, used natively and as the fallback when the
/// browser refuses storage access (private mode, quota, sandboxed iframe).
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    entries: BTreeMap<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Which browser storage area a [`BrowserStore`] writes to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StorageArea {
    Local,
    Session,
}

#[cfg(target_arch = "wasm32")]
mod wasm_storage {
    use super::{KeyValueStore, StorageArea, StorageError};

    #[derive(Debug)]
    pub struct BrowserStore {
        area: StorageArea,
    }

    impl BrowserStore {
        /// Fails if the requested area cannot be opened right now.
        pub fn open(area: StorageArea) -> Result<Self, StorageError> {
            let store = Self { area };
            store.storage()?;
            Ok(store)
        }

        pub fn area(&self) -> StorageArea {
            self.area
        }

        fn storage(&self) -> Result<web_sys::Storage, StorageError> {
            let win = web_sys::window().ok_or(StorageError::Unavailable)?;
            let storage = match self.area {
                StorageArea::Local => win.local_storage(),
                StorageArea::Session => win.session_storage(),
            };
            storage
                .map_err(|e| StorageError::Io(format!("storage access denied: {:?}", e)))?
                .ok_or(StorageError::Unavailable)
        }
    }

    impl KeyValueStore for BrowserStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.storage()?
                .get_item(key)
                .map_err(|e| StorageError::Io(format!("get_item({key}) failed: {:?}", e)))
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            // set_item throws QuotaExceededError when full.
            self.storage()?
                .set_item(key, value)
                .map_err(|e| StorageError::Io(format!("set_item({key}) failed: {:?}", e)))
        }

        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            self.storage()?
                .remove_item(key)
                .map_err(|e| StorageError::Io(format!("remove_item({key}) failed: {:?}", e)))
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_storage::BrowserStore;

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct BrowserStore;

#[cfg(not(target_arch = "wasm32"))]
impl BrowserStore {
    pub fn open(_area: StorageArea) -> Result<Self, StorageError> {
        Err(StorageError::Unavailable)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStore for BrowserStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// Opens browser storage for `area`, falling back to memory when it is refused.
pub fn open_or_memory(area: StorageArea) -> Box<dyn KeyValueStore> {
    match BrowserStore::open(area) {
        Ok(s) => Box::new(s),
        Err(err) => {
            tracing::warn!("{area:?} storage unavailable, keeping state in memory: {err}");
            Box::new(InMemoryStore::new())
        }
    }
}
