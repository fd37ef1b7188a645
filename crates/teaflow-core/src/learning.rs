//! Per-tea, per-vessel steep offsets learned from feedback.
//!
//! Offsets live in one JSON document (`tea_id → bucket → steep index → s`).
//! Every update is an exponentially smoothed read-modify-write run through
//! [`KvStore::update`], so concurrent writers (threads, or other processes
//! on the same database) never lose each other's updates.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::buckets::VesselBucket;
use crate::error::{ensure_finite, Result};
use crate::numeric::round_half_up;
use crate::storage::{keys, load_json, update_json, KvStore};

/// Largest learned correction in either direction, in seconds.
pub const MAX_OFFSET_SEC: i32 = 60;

/// Weight kept from the current offset on each update.
pub const SMOOTHING_KEEP: f64 = 0.7;

/// Weight given to the new delta on each update.
pub const SMOOTHING_GAIN: f64 = 0.3;

/// Steep index → offset in seconds.
pub type Offsets = BTreeMap<usize, i32>;

/// tea id → vessel bucket → offsets.
pub type LearningMap = HashMap<String, HashMap<VesselBucket, Offsets>>;

/// One smoothing step: `round(cur*0.7 + delta*0.3)` clamped to ±60.
pub fn smooth(current: i32, delta_sec: f64) -> i32 {
    let next = round_half_up(f64::from(current) * SMOOTHING_KEEP + delta_sec * SMOOTHING_GAIN);
    next.clamp(f64::from(-MAX_OFFSET_SEC), f64::from(MAX_OFFSET_SEC)) as i32
}

/// Persistent store of learned steep offsets.
pub struct PersonalizationStore {
    store: Arc<dyn KvStore>,
}

impl PersonalizationStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// The whole learning document.
    pub fn learning(&self) -> Result<LearningMap> {
        load_json(self.store.as_ref(), keys::LEARNING)
    }

    /// Offsets for steeps `0..count`, with 0 for anything not learned yet.
    pub fn offsets(&self, tea_id: &str, bucket: VesselBucket, count: usize) -> Result<Vec<i32>> {
        let learning = self.learning()?;
        let stored = learning.get(tea_id).and_then(|b| b.get(&bucket));
        Ok((0..count)
            .map(|i| stored.and_then(|o| o.get(&i)).copied().unwrap_or(0))
            .collect())
    }

    /// The stored offset for one steep, or `None` if nothing was ever learned.
    pub fn offset(&self, tea_id: &str, bucket: VesselBucket, steep_index: usize) -> Result<Option<i32>> {
        let learning = self.learning()?;
        Ok(learning
            .get(tea_id)
            .and_then(|b| b.get(&bucket))
            .and_then(|o| o.get(&steep_index))
            .copied())
    }

    /// Fold `delta_sec` into the stored offset and return the new value.
    ///
    /// # Errors
    /// Fails on a non-finite delta or when the store cannot be read or written.
    pub fn apply_offset(
        &self,
        tea_id: &str,
        bucket: VesselBucket,
        steep_index: usize,
        delta_sec: f64,
    ) -> Result<i32> {
        let delta_sec = ensure_finite("deltaSeconds", delta_sec)?;

        let (current, next) = update_json(self.store.as_ref(), keys::LEARNING, |learning: &mut LearningMap| {
            let offsets = learning
                .entry(tea_id.to_string())
                .or_default()
                .entry(bucket)
                .or_default();
            let current = offsets.get(&steep_index).copied().unwrap_or(0);
            let next = smooth(current, delta_sec);
            offsets.insert(steep_index, next);
            Ok((current, next))
        })?;

        tracing::debug!(
            tea_id,
            bucket = %bucket,
            steep_index,
            delta_sec,
            from = current,
            to = next,
            "applied learned offset"
        );
        Ok(next)
    }

    /// Forget everything learned for a tea. Returns whether anything was stored.
    pub fn reset(&self, tea_id: &str) -> Result<bool> {
        let removed = update_json(self.store.as_ref(), keys::LEARNING, |learning: &mut LearningMap| {
            Ok(learning.remove(tea_id).is_some())
        })?;
        if removed {
            tracing::info!(tea_id, "cleared learned offsets");
        }
        Ok(removed)
    }
}
