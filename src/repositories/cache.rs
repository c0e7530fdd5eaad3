use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::anyhow;
use dashmap::DashMap;
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

pub const WITHDRAWAL_REQUESTS_KEY: &str = "withdrawal_requests";
pub const CURRENT_USER_KEY: &str = "current_user";
pub const LOGGED_IN_USER_KEY: &str = "logged_in_user";
pub const USERS_KEY: &str = "users";
pub const WALLETS_KEY: &str = "wallets";
pub const REFERRAL_BONUSES_KEY: &str = "referral_bonuses";

/// Key-value mirror of the last known server state.
pub trait CacheStore: Send + Sync {
    fn get_value(&self, key: &str) -> Result<Option<Value>, anyhow::Error>;
    fn set_value(&self, key: &str, value: Value) -> Result<(), anyhow::Error>;
    fn remove(&self, key: &str) -> Result<(), anyhow::Error>;
}

pub trait CacheStoreExt {
    fn get_from_storage<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, anyhow::Error>;
    fn set_to_storage<T: Serialize + ?Sized>(&self, key: &str, value: &T)
        -> Result<(), anyhow::Error>;
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {
    fn get_from_storage<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, anyhow::Error> {
        match self.get_value(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn set_to_storage<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), anyhow::Error> {
        self.set_value(key, serde_json::to_value(value)?)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Value>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get_value(&self, key: &str) -> Result<Option<Value>, anyhow::Error> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set_value(&self, key: &str, value: Value) -> Result<(), anyhow::Error> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), anyhow::Error> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Cache persisted as a single JSON object on disk. Every write flushes the
/// whole object.
pub struct FileCache {
    path: PathBuf,
    entries: DashMap<String, Value>,
    flush_lock: Mutex<()>,
}

impl FileCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = DashMap::new();
        if path.exists() {
            match fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|raw| Ok(serde_json::from_str::<serde_json::Map<String, Value>>(&raw)?))
            {
                Ok(stored) => {
                    for (key, value) in stored {
                        entries.insert(key, value);
                    }
                }
                Err(e) => {
                    log::warn!(
                        "Could not read cache file {}, starting empty: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        log::debug!("Opened cache at {} with {} keys", path.display(), entries.len());

        Ok(Self {
            path,
            entries,
            flush_lock: Mutex::new(()),
        })
    }

    pub fn default_path() -> Result<PathBuf, anyhow::Error> {
        let proj_dirs = ProjectDirs::from("app", "valuelife", "wallet-sync")
            .ok_or_else(|| anyhow!("Could not resolve a home directory for the cache"))?;

        Ok(proj_dirs.cache_dir().join("storage.json"))
    }

    fn flush(&self) -> Result<(), anyhow::Error> {
        let _guard = self
            .flush_lock
            .lock()
            .map_err(|_| anyhow!("Cache flush lock poisoned"))?;

        let snapshot: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        fs::write(&self.path, serde_json::to_vec_pretty(&snapshot)?)?;
        Ok(())
    }
}

impl CacheStore for FileCache {
    fn get_value(&self, key: &str) -> Result<Option<Value>, anyhow::Error> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set_value(&self, key: &str, value: Value) -> Result<(), anyhow::Error> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<(), anyhow::Error> {
        self.entries.remove(key);
        self.flush()
    }
}
