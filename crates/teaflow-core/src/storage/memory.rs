use std::collections::HashMap;
use std::sync::RwLock;

use super::{KvStore, UpdateFn};
use crate::error::{Result, StorageError};

/// In-process key-value store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.read()?.keys().cloned().collect())
    }

    fn update(&self, keys: &[&str], f: &mut UpdateFn<'_>) -> Result<()> {
        let mut entries = self.entries.write()?;
        let mut values: Vec<Option<String>> = keys.iter().map(|k| entries.get(*k).cloned()).collect();
        f(values.as_mut_slice())?;
        for (key, value) in keys.iter().zip(values) {
            match value {
                Some(value) => entries.insert(key.to_string(), value),
                None => entries.remove(*key),
            };
        }
        Ok(())
    }

    fn remove_matching(&self, pred: &dyn Fn(&str) -> bool) -> Result<usize> {
        let mut entries = self.entries.write()?;
        let before = entries.len();
        entries.retain(|key, _| !pred(key.as_str()));
        Ok(before - entries.len())
    }
}
