//! Offline action queue with retry and cache bookkeeping.
//!
//! Every persisted change is offered to a [`SyncSink`]. While offline, or
//! when the sink fails, the change is queued under `teaflow:offline_actions`
//! and retried on the next sync pass. An action that fails `max_retries`
//! times is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::sink::SyncSink;
use super::types::{
    ActionType, CacheKind, CacheStatus, OfflineAction, OfflineState, PersistedOfflineState,
    SyncInfo, SyncReport,
};
use crate::error::Result;
use crate::events::Event;
use crate::storage::{keys, load_json, save_json, update_json, KvStore, SyncConfig};

const EVENT_CAPACITY: usize = 64;

/// Clears the in-progress flag when a sync pass ends, however it ends.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Offline-first sync coordinator.
pub struct OfflineSync {
    store: Arc<dyn KvStore>,
    sink: Arc<dyn SyncSink>,
    config: SyncConfig,
    state: Mutex<OfflineState>,
    sync_in_progress: AtomicBool,
    events: broadcast::Sender<Event>,
}

impl OfflineSync {
    /// Restore queue and cache state from the store.
    ///
    /// Unreadable persisted state is logged and replaced with a fresh one.
    pub fn new(store: Arc<dyn KvStore>, sink: Arc<dyn SyncSink>, config: SyncConfig) -> Self {
        let mut state = OfflineState::default();

        match load_json::<PersistedOfflineState>(store.as_ref(), keys::OFFLINE_STATE) {
            Ok(saved) => {
                state.is_connected = saved.is_connected;
                state.last_sync_time = saved.last_sync_time;
                state.cache_status = saved.cache_status;
            }
            Err(e) => tracing::error!(error = %e, "failed to load offline state"),
        }
        match load_json::<Vec<OfflineAction>>(store.as_ref(), keys::OFFLINE_ACTIONS) {
            Ok(actions) => state.pending_actions = actions,
            Err(e) => tracing::error!(error = %e, "failed to load pending offline actions"),
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            sink,
            config,
            state: Mutex::new(state),
            sync_in_progress: AtomicBool::new(false),
            events,
        }
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn persist(&self, state: &OfflineState) -> Result<()> {
        save_json(
            self.store.as_ref(),
            keys::OFFLINE_STATE,
            &PersistedOfflineState {
                is_connected: state.is_connected,
                last_sync_time: state.last_sync_time,
                cache_status: state.cache_status,
            },
        )
    }

    /// Apply `f` to the stored action list and mirror the result in `state`.
    ///
    /// Works on the persisted list rather than the in-memory copy, so actions
    /// queued by another handle on the same store are kept.
    fn update_actions<F>(&self, state: &mut OfflineState, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Vec<OfflineAction>),
    {
        state.pending_actions = update_json(
            self.store.as_ref(),
            keys::OFFLINE_ACTIONS,
            |actions: &mut Vec<OfflineAction>| {
                f(actions);
                Ok(actions.clone())
            },
        )?;
        Ok(())
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> Result<OfflineState> {
        Ok(self.state.lock()?.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().map(|s| s.is_connected).unwrap_or(false)
    }

    /// Record a connectivity change. Coming back online with work pending
    /// runs a sync pass and returns its report.
    pub fn set_connected(&self, connected: bool) -> Result<Option<SyncReport>> {
        let (was_offline, pending) = {
            let mut state = self.state.lock()?;
            let was_offline = !state.is_connected;
            state.is_connected = connected;
            self.persist(&state)?;
            (was_offline, state.pending_actions.len())
        };
        tracing::info!(connected, pending, "connectivity changed");
        self.emit(Event::ConnectivityChanged {
            connected,
            at: Utc::now(),
        });

        if was_offline && connected && pending > 0 {
            return self.sync_pending();
        }
        Ok(None)
    }

    /// Perform now if online, otherwise queue.
    ///
    /// Returns `true` when the sink accepted the action immediately.
    pub fn execute_action<T: Serialize>(&self, action_type: ActionType, data: &T) -> Result<bool> {
        let data = serde_json::to_value(data)?;

        if self.is_connected() {
            let action = OfflineAction::new(action_type, data);
            match self.sink.perform(&action) {
                Ok(()) => Ok(true),
                Err(e) => {
                    tracing::warn!(
                        action_type = action_type.as_str(),
                        error = %e,
                        "action failed, queueing for offline sync"
                    );
                    self.queue_action(action_type, action.data)?;
                    Ok(false)
                }
            }
        } else {
            self.queue_action(action_type, data)?;
            Ok(false)
        }
    }

    /// Append an action to the pending queue and return its id.
    ///
    /// When online, a sync pass runs straight away.
    pub fn queue_action(&self, action_type: ActionType, data: serde_json::Value) -> Result<String> {
        let action = OfflineAction::new(action_type, data);
        let id = action.id.clone();

        let (connected, pending_count) = {
            let mut state = self.state.lock()?;
            self.update_actions(&mut state, |actions| actions.push(action.clone()))?;
            (state.is_connected, state.pending_actions.len())
        };
        tracing::debug!(action_id = %id, pending_count, "queued offline action");
        self.emit(Event::ActionQueued {
            action_id: id.clone(),
            action_type,
            pending_count,
            at: Utc::now(),
        });

        if connected {
            if let Err(e) = self.sync_pending() {
                tracing::error!(error = %e, "immediate sync failed");
            }
        }
        Ok(id)
    }

    /// Offer every pending action to the sink once.
    ///
    /// Returns `None` when offline or when another pass is already running.
    pub fn sync_pending(&self) -> Result<Option<SyncReport>> {
        if !self.is_connected() {
            return Ok(None);
        }
        if self
            .sync_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }
        let _guard = SyncGuard(&self.sync_in_progress);

        let to_sync: Vec<OfflineAction> = load_json(self.store.as_ref(), keys::OFFLINE_ACTIONS)?;
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for action in &to_sync {
            match self.sink.perform(action) {
                Ok(()) => succeeded.push(action.id.clone()),
                Err(e) => {
                    tracing::error!(action_id = %action.id, error = %e, "failed to sync action");
                    failed.push(action.id.clone());
                }
            }
        }

        let mut report = SyncReport {
            synced: succeeded.len(),
            failed: failed.len(),
            dropped: 0,
        };

        let pending_count = {
            let mut state = self.state.lock()?;
            let max_retries = self.config.max_retries;
            let mut dropped = 0;
            self.update_actions(&mut state, |actions| {
                dropped = 0;
                actions.retain_mut(|a| {
                    if succeeded.contains(&a.id) {
                        return false;
                    }
                    if failed.contains(&a.id) {
                        a.retry_count += 1;
                        if a.retry_count >= max_retries {
                            tracing::warn!(action_id = %a.id, retries = a.retry_count, "dropping action");
                            dropped += 1;
                            return false;
                        }
                    }
                    true
                });
            })?;
            report.dropped = dropped;
            state.last_sync_time = Some(Utc::now());
            self.persist(&state)?;
            state.pending_actions.len()
        };

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            dropped = report.dropped,
            pending_count,
            "sync pass finished"
        );
        self.emit(Event::SyncCompleted {
            report: report.clone(),
            pending_count,
            at: Utc::now(),
        });
        Ok(Some(report))
    }

    /// Manual sync trigger. Returns `false` when offline.
    pub fn force_sync(&self) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        self.sync_pending()?;
        Ok(true)
    }

    pub fn update_cache_status(&self, kind: CacheKind, fresh: bool) -> Result<()> {
        let status = {
            let mut state = self.state.lock()?;
            state.cache_status.set(kind, fresh);
            self.persist(&state)?;
            state.cache_status
        };
        self.emit(Event::CacheStatusChanged {
            status,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Drop cached data (everything but offline, onboarding and theme state)
    /// and return how many keys were removed.
    pub fn clear_cache(&self) -> Result<usize> {
        let removed = self.store.remove_matching(&keys::is_clearable)?;

        {
            let mut state = self.state.lock()?;
            state.cache_status = CacheStatus::default();
            self.persist(&state)?;
        }
        tracing::info!(removed, "cleared cache");
        self.emit(Event::CacheCleared {
            removed_keys: removed,
            at: Utc::now(),
        });
        Ok(removed)
    }

    /// Total bytes stored under `teaflow:` keys.
    pub fn cache_size(&self) -> Result<usize> {
        let mut total = 0;
        for key in self.store.keys()? {
            if !key.starts_with(keys::PREFIX) {
                continue;
            }
            if let Some(value) = self.store.get(&key)? {
                total += value.len();
            }
        }
        Ok(total)
    }

    /// Whether data cached at `timestamp` is older than the expiry window.
    pub fn is_cache_expired(&self, timestamp: DateTime<Utc>) -> bool {
        Utc::now() - timestamp > Duration::days(self.config.cache_expiry_days)
    }

    pub fn sync_info(&self) -> Result<SyncInfo> {
        let state = self.state.lock()?;
        Ok(SyncInfo {
            pending_count: state.pending_actions.len(),
            last_sync: state.last_sync_time,
            can_sync: state.is_connected && !self.sync_in_progress.load(Ordering::Acquire),
        })
    }
}
