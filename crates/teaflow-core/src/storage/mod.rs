mod config;
pub mod database;
pub mod keys;
pub mod memory;

pub use config::{BrewConfig, Config, FeedbackConfig, LogConfig, SyncConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ConfigError, Result, StorageError};

/// Callback for [`KvStore::update`]: current values in, new values out.
pub type UpdateFn<'a> = dyn FnMut(&mut [Option<String>]) -> Result<()> + 'a;

/// String-keyed persistence.
///
/// Absent keys read as `Ok(None)`; only genuine faults are errors.
/// All engine state is JSON stored under the keys in [`keys`].
///
/// Plain `set` is last-write-wins. Read-modify-write cycles go through
/// [`update`](KvStore::update), which is atomic across every handle on the
/// same backing store, including other processes sharing a database file.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently present, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Atomically read `keys`, let `f` rewrite the values in place, and
    /// write them back. A slot left as `None` removes its key.
    ///
    /// `f` runs while the store is locked and must not call back into it.
    /// If `f` fails nothing is written.
    fn update(&self, keys: &[&str], f: &mut UpdateFn<'_>) -> Result<()>;

    /// Atomically remove every key matching `pred` and return how many went.
    fn remove_matching(&self, pred: &dyn Fn(&str) -> bool) -> Result<usize>;
}

/// Read and decode a JSON value, falling back to `T::default()` when absent.
pub(crate) fn load_json<T>(store: &dyn KvStore, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match store.get(key)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(T::default()),
    }
}

/// Encode and write a JSON value.
pub(crate) fn save_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)?;
    Ok(())
}

fn decode<T: DeserializeOwned + Default>(raw: Option<&String>) -> Result<T> {
    match raw {
        Some(raw) => Ok(serde_json::from_str(raw)?),
        None => Ok(T::default()),
    }
}

/// Atomically decode one JSON document, modify it, and write it back.
pub(crate) fn update_json<T, R, F>(store: &dyn KvStore, key: &str, mut f: F) -> Result<R>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnMut(&mut T) -> Result<R>,
{
    let mut out = None;
    store.update(&[key], &mut |values: &mut [Option<String>]| {
        let mut doc: T = decode(values[0].as_ref())?;
        out = Some(f(&mut doc)?);
        values[0] = Some(serde_json::to_string(&doc)?);
        Ok(())
    })?;
    out.ok_or_else(|| StorageError::QueryFailed(format!("update of {key} did not run")).into())
}

/// Like [`update_json`] over two documents that must change together.
pub(crate) fn update_json_pair<A, B, R, F>(store: &dyn KvStore, keys: [&str; 2], mut f: F) -> Result<R>
where
    A: DeserializeOwned + Serialize + Default,
    B: DeserializeOwned + Serialize + Default,
    F: FnMut(&mut A, &mut B) -> Result<R>,
{
    let mut out = None;
    store.update(&keys, &mut |values: &mut [Option<String>]| {
        let mut a: A = decode(values[0].as_ref())?;
        let mut b: B = decode(values[1].as_ref())?;
        out = Some(f(&mut a, &mut b)?);
        values[0] = Some(serde_json::to_string(&a)?);
        values[1] = Some(serde_json::to_string(&b)?);
        Ok(())
    })?;
    out.ok_or_else(|| StorageError::QueryFailed(format!("update of {} did not run", keys.join(", "))).into())
}

/// Returns the TeaFlow data directory, creating it if needed.
///
/// `TEAFLOW_DATA_DIR` overrides everything. Otherwise `~/.config/teaflow`,
/// or `~/.config/teaflow-dev` when `TEAFLOW_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("TEAFLOW_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("TEAFLOW_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("teaflow-dev")
            } else {
                base_dir.join("teaflow")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_json_defaults_when_absent() {
        let store = MemoryStore::new();
        let map: HashMap<String, u32> = load_json(&store, "teaflow:missing").unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn save_then_load_json() {
        let store = MemoryStore::new();
        let mut map = HashMap::new();
        map.insert("oolong".to_string(), 3u32);
        save_json(&store, "teaflow:test", &map).unwrap();
        let loaded: HashMap<String, u32> = load_json(&store, "teaflow:test").unwrap();
        assert_eq!(loaded.get("oolong"), Some(&3));
    }

    #[test]
    fn update_json_starts_from_default() {
        let store = MemoryStore::new();
        let len = update_json(&store, "teaflow:list", |list: &mut Vec<u32>| {
            list.push(7);
            Ok(list.len())
        })
        .unwrap();
        assert_eq!(len, 1);
        assert_eq!(store.get("teaflow:list").unwrap().as_deref(), Some("[7]"));
    }

    #[test]
    fn failed_update_writes_nothing() {
        let store = MemoryStore::new();
        store.set("teaflow:list", "[1]").unwrap();
        let result: Result<()> = update_json_pair(
            &store,
            ["teaflow:list", "teaflow:other"],
            |list: &mut Vec<u32>, other: &mut Vec<u32>| {
                list.push(2);
                other.push(3);
                Err(StorageError::Locked.into())
            },
        );
        assert!(result.is_err());
        assert_eq!(store.get("teaflow:list").unwrap().as_deref(), Some("[1]"));
        assert!(store.get("teaflow:other").unwrap().is_none());
    }

    #[test]
    fn load_json_surfaces_corrupt_payloads() {
        let store = MemoryStore::new();
        store.set("teaflow:test", "{not json").unwrap();
        let result: Result<HashMap<String, u32>> = load_json(&store, "teaflow:test");
        assert!(result.is_err());
    }
}
