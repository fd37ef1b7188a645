//! Fixed storage keys. Everything TeaFlow persists lives under `teaflow:`.

pub const PREFIX: &str = "teaflow:";

pub const LEARNING: &str = "teaflow:learning";
pub const FEEDBACK: &str = "teaflow:feedback";
pub const ANALYTICS: &str = "teaflow:analytics";
pub const USER_TEAS: &str = "teaflow:userTeas";
pub const LAST_STEEPS: &str = "teaflow:lastSteeps";
pub const PREFS: &str = "teaflow:prefs";
pub const OFFLINE_ACTIONS: &str = "teaflow:offline_actions";
pub const OFFLINE_STATE: &str = "teaflow:offline_state";

/// Whether a cache clear may drop this key.
///
/// Offline queue state, onboarding and theme survive a clear.
pub fn is_clearable(key: &str) -> bool {
    key.starts_with(PREFIX)
        && !key.contains("offline")
        && !key.contains("onboarding")
        && !key.contains("theme")
}
