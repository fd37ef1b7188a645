//! Core types for the offline action queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change waiting to reach the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    TeaSave,
    FeedbackSave,
    AnalyticsUpdate,
    PreferencesSave,
    SteepLog,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::TeaSave => "tea_save",
            ActionType::FeedbackSave => "feedback_save",
            ActionType::AnalyticsUpdate => "analytics_update",
            ActionType::PreferencesSave => "preferences_save",
            ActionType::SteepLog => "steep_log",
        }
    }
}

/// A change recorded while offline (or after a failed attempt).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// JSON payload, exactly what the caller handed over.
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
}

impl OfflineAction {
    pub fn new(action_type: ActionType, data: serde_json::Value) -> Self {
        Self {
            id: format!("{}_{}", action_type.as_str(), uuid::Uuid::new_v4().simple()),
            action_type,
            data,
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }
}

/// Which locally cached data sets are known to be fresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub teas: bool,
    pub analytics: bool,
    pub preferences: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Teas,
    Analytics,
    Preferences,
}

impl CacheStatus {
    pub fn set(&mut self, kind: CacheKind, fresh: bool) {
        match kind {
            CacheKind::Teas => self.teas = fresh,
            CacheKind::Analytics => self.analytics = fresh,
            CacheKind::Preferences => self.preferences = fresh,
        }
    }
}

/// Full in-memory view of the offline layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineState {
    pub is_connected: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub pending_actions: Vec<OfflineAction>,
    pub cache_status: CacheStatus,
}

impl Default for OfflineState {
    fn default() -> Self {
        Self {
            is_connected: true,
            last_sync_time: None,
            pending_actions: Vec::new(),
            cache_status: CacheStatus::default(),
        }
    }
}

/// The part of [`OfflineState`] persisted under `teaflow:offline_state`.
///
/// Connectivity is kept so a manual offline switch survives a restart;
/// older documents without it read as connected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedOfflineState {
    #[serde(default = "connected_by_default")]
    pub is_connected: bool,
    #[serde(default)]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cache_status: CacheStatus,
}

fn connected_by_default() -> bool {
    true
}

impl Default for PersistedOfflineState {
    fn default() -> Self {
        Self {
            is_connected: true,
            last_sync_time: None,
            cache_status: CacheStatus::default(),
        }
    }
}

/// Summary for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInfo {
    pub pending_count: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub can_sync: bool,
}

/// Outcome of one pass over the pending actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    /// Actions dropped after reaching the retry limit.
    pub dropped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_ids_carry_their_type() {
        let action = OfflineAction::new(ActionType::FeedbackSave, serde_json::json!({"teaId": "green"}));
        assert!(action.id.starts_with("feedback_save_"));
        assert_eq!(action.retry_count, 0);
    }

    #[test]
    fn action_type_serializes_snake_case() {
        let json = serde_json::to_value(ActionType::PreferencesSave).unwrap();
        assert_eq!(json, "preferences_save");
    }

    #[test]
    fn cache_status_set() {
        let mut status = CacheStatus::default();
        status.set(CacheKind::Analytics, true);
        assert!(status.analytics);
        assert!(!status.teas && !status.preferences);
    }

    #[test]
    fn persisted_state_without_connectivity_reads_as_connected() {
        let state: PersistedOfflineState =
            serde_json::from_str(r#"{"lastSyncTime":null,"cacheStatus":{"teas":true,"analytics":false,"preferences":false}}"#)
                .unwrap();
        assert!(state.is_connected);
        assert!(state.cache_status.teas);
    }
}
