use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::{ActionType, CacheStatus, SyncReport};

/// State changes in the offline layer, published on a broadcast channel.
/// Status displays subscribe instead of polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ConnectivityChanged {
        connected: bool,
        at: DateTime<Utc>,
    },
    ActionQueued {
        action_id: String,
        action_type: ActionType,
        pending_count: usize,
        at: DateTime<Utc>,
    },
    SyncCompleted {
        report: SyncReport,
        pending_count: usize,
        at: DateTime<Utc>,
    },
    CacheStatusChanged {
        status: CacheStatus,
        at: DateTime<Utc>,
    },
    CacheCleared {
        removed_keys: usize,
        at: DateTime<Utc>,
    },
}
