//! User-created teas, recently brewed steeps, and per-tea brew preferences.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, Result};
use crate::storage::{keys, load_json, update_json, KvStore};
use crate::sync::{ActionType, CacheKind, OfflineSync};
use crate::tea::{builtin_teas, TeaProfile};

/// How many recent steeps are remembered.
pub const LAST_STEEPS_KEPT: usize = 2;

/// A steep the user just finished, shown as a "continue" shortcut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSteep {
    pub tea_id: String,
    pub name: String,
    pub infusion_index: usize,
    pub actual_sec: f64,
    pub ts: DateTime<Utc>,
}

/// Remembered brew settings for one tea. `None` means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeaPrefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_ml: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_c: Option<f64>,
}

impl TeaPrefs {
    /// Overlay the fields set in `other`.
    pub fn merge(&mut self, other: TeaPrefs) {
        if other.vessel_ml.is_some() {
            self.vessel_ml = other.vessel_ml;
        }
        if other.temp_c.is_some() {
            self.temp_c = other.temp_c;
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TeaDeleted<'a> {
    action: &'static str,
    tea_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrefsSaved<'a> {
    tea_id: &'a str,
    prefs: &'a TeaPrefs,
}

pub struct TeaLibrary {
    store: Arc<dyn KvStore>,
    sync: Arc<OfflineSync>,
}

impl TeaLibrary {
    pub fn new(store: Arc<dyn KvStore>, sync: Arc<OfflineSync>) -> Self {
        Self { store, sync }
    }

    pub fn load_user_teas(&self) -> Result<Vec<TeaProfile>> {
        load_json(self.store.as_ref(), keys::USER_TEAS)
    }

    /// Validate and upsert a user tea by id.
    pub fn save_user_tea(&self, mut tea: TeaProfile) -> Result<TeaProfile> {
        tea.validate()?;
        tea.user = Some(true);

        update_json(self.store.as_ref(), keys::USER_TEAS, |teas: &mut Vec<TeaProfile>| {
            match teas.iter_mut().find(|t| t.id == tea.id) {
                Some(existing) => *existing = tea.clone(),
                None => teas.push(tea.clone()),
            }
            Ok(())
        })?;
        tracing::info!(tea_id = %tea.id, "saved user tea");

        self.sync.execute_action(ActionType::TeaSave, &tea)?;
        self.sync.update_cache_status(CacheKind::Teas, true)?;
        Ok(tea)
    }

    /// Remove a user tea. Returns whether it existed.
    pub fn delete_user_tea(&self, tea_id: &str) -> Result<bool> {
        let removed = update_json(self.store.as_ref(), keys::USER_TEAS, |teas: &mut Vec<TeaProfile>| {
            let before = teas.len();
            teas.retain(|t| t.id != tea_id);
            Ok(teas.len() != before)
        })?;
        if !removed {
            return Ok(false);
        }
        tracing::info!(tea_id, "deleted user tea");

        self.sync.execute_action(
            ActionType::TeaSave,
            &TeaDeleted {
                action: "delete",
                tea_id,
            },
        )?;
        self.sync.update_cache_status(CacheKind::Teas, true)?;
        Ok(true)
    }

    /// Built-ins first, then user teas. A user tea replaces the built-in
    /// with the same id in place.
    pub fn all_teas(&self) -> Result<Vec<TeaProfile>> {
        let mut user: Vec<TeaProfile> = self.load_user_teas()?;
        let mut teas: Vec<TeaProfile> = builtin_teas()
            .into_iter()
            .map(|builtin| match user.iter().position(|u| u.id == builtin.id) {
                Some(i) => user.remove(i),
                None => builtin,
            })
            .collect();
        teas.extend(user);
        Ok(teas)
    }

    pub fn find_tea(&self, tea_id: &str) -> Result<Option<TeaProfile>> {
        Ok(self.all_teas()?.into_iter().find(|t| t.id == tea_id))
    }

    /// Remember a finished steep. The newest entry wins; repeats of the same
    /// tea and infusion are collapsed.
    pub fn push_last_steep(&self, steep: LastSteep) -> Result<Vec<LastSteep>> {
        ensure_finite("actualSec", steep.actual_sec)?;

        let list = update_json(self.store.as_ref(), keys::LAST_STEEPS, |list: &mut Vec<LastSteep>| {
            list.insert(0, steep.clone());
            *list = dedup_recent(std::mem::take(list));
            Ok(list.clone())
        })?;
        tracing::debug!(
            tea_id = %steep.tea_id,
            infusion_index = steep.infusion_index,
            "recorded last steep"
        );

        self.sync.execute_action(ActionType::SteepLog, &steep)?;
        Ok(list)
    }

    pub fn last_steeps(&self) -> Result<Vec<LastSteep>> {
        load_json(self.store.as_ref(), keys::LAST_STEEPS)
    }

    pub fn tea_prefs(&self, tea_id: &str) -> Result<TeaPrefs> {
        let mut all: HashMap<String, TeaPrefs> = load_json(self.store.as_ref(), keys::PREFS)?;
        Ok(all.remove(tea_id).unwrap_or_default())
    }

    /// Merge `prefs` into the stored preferences and return the result.
    pub fn set_tea_prefs(&self, tea_id: &str, prefs: TeaPrefs) -> Result<TeaPrefs> {
        if let Some(v) = prefs.vessel_ml {
            ensure_finite("vesselMl", v)?;
        }
        if let Some(t) = prefs.temp_c {
            ensure_finite("tempC", t)?;
        }

        let merged = update_json(self.store.as_ref(), keys::PREFS, |all: &mut HashMap<String, TeaPrefs>| {
            let entry = all.entry(tea_id.to_string()).or_default();
            entry.merge(prefs);
            Ok(*entry)
        })?;

        self.sync.execute_action(
            ActionType::PreferencesSave,
            &PrefsSaved {
                tea_id,
                prefs: &prefs,
            },
        )?;
        self.sync.update_cache_status(CacheKind::Preferences, true)?;
        Ok(merged)
    }
}

fn dedup_recent(list: Vec<LastSteep>) -> Vec<LastSteep> {
    let mut seen = HashSet::new();
    list.into_iter()
        .filter(|s| seen.insert((s.tea_id.clone(), s.infusion_index)))
        .take(LAST_STEEPS_KEPT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SyncConfig};
    use crate::sync::LogSink;
    use crate::tea::TeaType;

    fn library() -> (Arc<OfflineSync>, TeaLibrary) {
        let store = Arc::new(MemoryStore::new());
        let sync = Arc::new(OfflineSync::new(
            store.clone(),
            Arc::new(LogSink),
            SyncConfig::default(),
        ));
        (sync.clone(), TeaLibrary::new(store, sync))
    }

    fn user_tea(id: &str) -> TeaProfile {
        TeaProfile {
            id: id.to_string(),
            name: "Dan Cong".to_string(),
            tea_type: TeaType::Oolong,
            base_temp_c: 95.0,
            default_ratio: 1.0 / 14.0,
            base_schedule_sec: vec![5, 8, 10, 15],
            user: None,
        }
    }

    fn steep(tea_id: &str, infusion_index: usize) -> LastSteep {
        LastSteep {
            tea_id: tea_id.to_string(),
            name: tea_id.to_string(),
            infusion_index,
            actual_sec: 20.0,
            ts: Utc::now(),
        }
    }

    #[test]
    fn save_user_tea_upserts_by_id() {
        let (sync, lib) = library();
        lib.save_user_tea(user_tea("dancong")).unwrap();
        let mut edited = user_tea("dancong");
        edited.base_temp_c = 90.0;
        lib.save_user_tea(edited).unwrap();

        let teas = lib.load_user_teas().unwrap();
        assert_eq!(teas.len(), 1);
        assert_eq!(teas[0].base_temp_c, 90.0);
        assert!(teas[0].is_user());
        assert!(sync.state().unwrap().cache_status.teas);
    }

    #[test]
    fn save_rejects_invalid_profiles() {
        let (_, lib) = library();
        let mut bad = user_tea("bad");
        bad.base_schedule_sec.clear();
        assert!(lib.save_user_tea(bad).is_err());
        assert!(lib.load_user_teas().unwrap().is_empty());
    }

    #[test]
    fn user_teas_shadow_builtins() {
        let (_, lib) = library();
        let mut custom_green = user_tea("green");
        custom_green.base_temp_c = 70.0;
        lib.save_user_tea(custom_green).unwrap();
        lib.save_user_tea(user_tea("dancong")).unwrap();

        let teas = lib.all_teas().unwrap();
        assert_eq!(teas.len(), 7);
        assert_eq!(teas.iter().filter(|t| t.id == "green").count(), 1);
        assert_eq!(lib.find_tea("green").unwrap().unwrap().base_temp_c, 70.0);
        assert_eq!(teas.last().unwrap().id, "dancong");

        assert!(lib.delete_user_tea("green").unwrap());
        assert!(!lib.delete_user_tea("green").unwrap());
        assert_eq!(lib.find_tea("green").unwrap().unwrap().base_temp_c, 78.0);
    }

    #[test]
    fn last_steeps_keep_two_distinct_entries() {
        let (_, lib) = library();
        lib.push_last_steep(steep("green", 0)).unwrap();
        lib.push_last_steep(steep("green", 1)).unwrap();
        lib.push_last_steep(steep("green", 1)).unwrap();
        let list = lib.push_last_steep(steep("black", 0)).unwrap();

        let keys: Vec<_> = list.iter().map(|s| (s.tea_id.as_str(), s.infusion_index)).collect();
        assert_eq!(keys, vec![("black", 0), ("green", 1)]);
        assert_eq!(lib.last_steeps().unwrap(), list);
    }

    #[test]
    fn prefs_merge_field_by_field() {
        let (sync, lib) = library();
        assert_eq!(lib.tea_prefs("oolong").unwrap(), TeaPrefs::default());

        lib.set_tea_prefs(
            "oolong",
            TeaPrefs {
                vessel_ml: Some(120.0),
                temp_c: Some(95.0),
            },
        )
        .unwrap();
        let merged = lib
            .set_tea_prefs(
                "oolong",
                TeaPrefs {
                    vessel_ml: None,
                    temp_c: Some(90.0),
                },
            )
            .unwrap();

        assert_eq!(merged.vessel_ml, Some(120.0));
        assert_eq!(merged.temp_c, Some(90.0));
        assert_eq!(lib.tea_prefs("oolong").unwrap(), merged);
        assert!(sync.state().unwrap().cache_status.preferences);
    }

    #[test]
    fn offline_changes_are_queued() {
        let (sync, lib) = library();
        sync.set_connected(false).unwrap();
        lib.save_user_tea(user_tea("dancong")).unwrap();
        lib.push_last_steep(steep("dancong", 0)).unwrap();

        let pending = sync.state().unwrap().pending_actions;
        let types: Vec<_> = pending.iter().map(|a| a.action_type).collect();
        assert_eq!(types, vec![ActionType::TeaSave, ActionType::SteepLog]);
    }
}
