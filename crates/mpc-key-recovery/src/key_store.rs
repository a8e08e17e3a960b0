use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::recovery::ExtendedKeySet;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0} is already stored; pass overwrite to replace it")]
pub struct AlreadyExists(pub String);

/// Process-local store for recovered extended keys, shared by reference between callers.
#[derive(Default)]
pub struct KeyStore {
    inner: Mutex<HashMap<String, String>>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        f.debug_struct("KeyStore").field("keys", &names).finish_non_exhaustive()
    }
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    // The map holds plain strings, so a panic elsewhere cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn put(&self, key: &str, value: &str, overwrite: bool) -> Result<(), AlreadyExists> {
        let mut map = self.lock();
        if !overwrite && map.contains_key(key) {
            return Err(AlreadyExists(key.to_owned()));
        }
        map.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Stores every present key of `set` under `xprv`, `xpub`, `fprv` and `fpub`.
    ///
    /// Checks all names before writing, so a conflict leaves the store unchanged.
    pub fn store_recovered(&self, set: &ExtendedKeySet, overwrite: bool) -> Result<usize, AlreadyExists> {
        let entries: Vec<(&str, &str)> = [
            ("xprv", set.xprv.as_deref()),
            ("xpub", set.xpub.as_deref()),
            ("fprv", set.fprv.as_deref()),
            ("fpub", set.fpub.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, v)| v.map(|value| (name, value)))
        .collect();

        let mut map = self.lock();
        if !overwrite {
            if let Some((name, _)) = entries.iter().find(|(name, _)| map.contains_key(*name)) {
                return Err(AlreadyExists((*name).to_owned()));
            }
        }
        for (name, value) in &entries {
            map.insert((*name).to_owned(), (*value).to_owned());
        }
        Ok(entries.len())
    }
}
