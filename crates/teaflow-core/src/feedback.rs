//! Post-brew feedback: the append-only log, per-tea analytics, and
//! adjustment recommendations.
//!
//! Every saved rating flows three ways: into the capped feedback log, into a
//! recomputed [`TeaAnalytics`] projection, and (unless it was "perfect")
//! into the learned offset for that tea, vessel bucket, and steep.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::buckets::bucket;
use crate::error::{ensure_finite, Result, ValidationError};
use crate::learning::PersonalizationStore;
use crate::numeric::round_half_up;
use crate::storage::{keys, load_json, update_json_pair, FeedbackConfig, KvStore};
use crate::sync::{ActionType, CacheKind, OfflineSync};

/// Smallest automatic correction for a weak or strong rating, in seconds.
const MIN_ADJUSTMENT_SEC: f64 = 5.0;

/// Share of the brewed time used as the correction.
const ADJUSTMENT_SHARE: f64 = 0.1;

/// Sample size at which recommendation confidence reaches 100.
const FULL_CONFIDENCE_SAMPLES: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Perfect,
    Strong,
}

impl Strength {
    pub fn as_str(self) -> &'static str {
        match self {
            Strength::Weak => "weak",
            Strength::Perfect => "perfect",
            Strength::Strong => "strong",
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strength {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "weak" => Ok(Strength::Weak),
            "perfect" => Ok(Strength::Perfect),
            "strong" => Ok(Strength::Strong),
            other => Err(ValidationError::value("strength", format!("unknown strength '{other}'"))),
        }
    }
}

/// A rating as submitted, before it is timestamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBrewFeedback {
    pub tea_id: String,
    pub steep_index: usize,
    pub vessel_ml: f64,
    pub temp_c: f64,
    pub actual_sec: f64,
    pub strength: Strength,
    /// 1 (disliked) to 5 (loved).
    pub enjoyment: u8,
}

impl NewBrewFeedback {
    pub fn at(self, timestamp: DateTime<Utc>) -> BrewFeedback {
        BrewFeedback {
            tea_id: self.tea_id,
            steep_index: self.steep_index,
            vessel_ml: self.vessel_ml,
            temp_c: self.temp_c,
            actual_sec: self.actual_sec,
            strength: self.strength,
            enjoyment: self.enjoyment,
            timestamp,
        }
    }
}

/// One completed, rated steep. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrewFeedback {
    pub tea_id: String,
    pub steep_index: usize,
    pub vessel_ml: f64,
    pub temp_c: f64,
    pub actual_sec: f64,
    pub strength: Strength,
    pub enjoyment: u8,
    pub timestamp: DateTime<Utc>,
}

impl BrewFeedback {
    /// Reject non-finite numbers; clamp the rest into range.
    fn sanitized(mut self) -> Result<Self, ValidationError> {
        ensure_finite("vesselMl", self.vessel_ml)?;
        ensure_finite("tempC", self.temp_c)?;
        ensure_finite("actualSec", self.actual_sec)?;
        self.actual_sec = self.actual_sec.max(0.0);
        self.enjoyment = self.enjoyment.clamp(1, 5);
        Ok(self)
    }
}

/// Signed correction for a rating: longer for weak, shorter for strong.
pub fn strength_adjustment(strength: Strength, actual_sec: f64) -> f64 {
    let base = MIN_ADJUSTMENT_SEC.max(actual_sec * ADJUSTMENT_SHARE);
    match strength {
        Strength::Weak => base,
        Strength::Strong => -base,
        Strength::Perfect => 0.0,
    }
}

/// Rolling statistics for one tea, always rebuilt from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeaAnalytics {
    pub total_brews: usize,
    pub average_enjoyment: f64,
    pub preferred_strength: Strength,
    pub average_temp: f64,
    pub average_vessel: f64,
    pub last_feedback: Option<DateTime<Utc>>,
    /// Number of "perfect" ratings.
    pub improvements: usize,
}

impl Default for TeaAnalytics {
    fn default() -> Self {
        Self {
            total_brews: 0,
            average_enjoyment: 0.0,
            preferred_strength: Strength::Perfect,
            average_temp: 0.0,
            average_vessel: 0.0,
            last_feedback: None,
            improvements: 0,
        }
    }
}

impl TeaAnalytics {
    /// Fold a tea's feedback records. `None` when there are none.
    pub fn from_feedback<'a, I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a BrewFeedback>,
    {
        let mut total = 0usize;
        let mut enjoyment = 0.0;
        let mut temp = 0.0;
        let mut vessel = 0.0;
        let mut last: Option<DateTime<Utc>> = None;
        let mut counts = StrengthCounts::default();

        for f in records {
            total += 1;
            enjoyment += f64::from(f.enjoyment);
            temp += f.temp_c;
            vessel += f.vessel_ml;
            last = Some(last.map_or(f.timestamp, |l| l.max(f.timestamp)));
            counts.add(f.strength);
        }

        if total == 0 {
            return None;
        }
        let n = total as f64;
        Some(Self {
            total_brews: total,
            average_enjoyment: enjoyment / n,
            preferred_strength: counts.most_frequent(),
            average_temp: temp / n,
            average_vessel: vessel / n,
            last_feedback: last,
            improvements: counts.perfect,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct StrengthCounts {
    weak: usize,
    perfect: usize,
    strong: usize,
}

impl StrengthCounts {
    fn add(&mut self, strength: Strength) {
        match strength {
            Strength::Weak => self.weak += 1,
            Strength::Perfect => self.perfect += 1,
            Strength::Strong => self.strong += 1,
        }
    }

    /// Ties prefer perfect, then weak.
    fn most_frequent(&self) -> Strength {
        let max = self.weak.max(self.perfect).max(self.strong);
        if self.perfect == max {
            Strength::Perfect
        } else if self.weak == max {
            Strength::Weak
        } else {
            Strength::Strong
        }
    }
}

/// Suggested change to steep time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeAdjustment {
    NotEnoughData,
    Maintain,
    Increase { seconds: u32 },
    Reduce { seconds: u32 },
}

impl fmt::Display for TimeAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeAdjustment::NotEnoughData => f.write_str("No adjustments yet"),
            TimeAdjustment::Maintain => f.write_str("Maintain current timing"),
            TimeAdjustment::Increase { seconds } => write!(f, "Increase steep time by {seconds}s"),
            TimeAdjustment::Reduce { seconds } => write!(f, "Reduce steep time by {seconds}s"),
        }
    }
}

/// Suggested change to water temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempAdjustment {
    NotEnoughData,
    Maintain,
    Raise,
    Lower,
}

impl fmt::Display for TempAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TempAdjustment::NotEnoughData => "No adjustments yet",
            TempAdjustment::Maintain => "Maintain current temperature",
            TempAdjustment::Raise => "Consider raising temperature by 3-5°C",
            TempAdjustment::Lower => "Consider lowering temperature by 3-5°C",
        })
    }
}

/// What the recent ratings suggest changing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub time_adjustment: TimeAdjustment,
    pub temp_adjustment: TempAdjustment,
    /// 0-100, driven by sample size only.
    pub confidence: u8,
}

/// Feedback log, analytics projection, and the learning hook.
pub struct FeedbackAnalytics {
    store: Arc<dyn KvStore>,
    personalization: Arc<PersonalizationStore>,
    sync: Arc<OfflineSync>,
    config: FeedbackConfig,
}

impl FeedbackAnalytics {
    pub fn new(
        store: Arc<dyn KvStore>,
        personalization: Arc<PersonalizationStore>,
        sync: Arc<OfflineSync>,
        config: FeedbackConfig,
    ) -> Self {
        Self {
            store,
            personalization,
            sync,
            config,
        }
    }

    /// Timestamp a rating with the current time and record it.
    pub fn save_brew_feedback(&self, feedback: NewBrewFeedback) -> Result<BrewFeedback> {
        self.record_feedback(feedback.at(Utc::now()))
    }

    /// Record a timestamped rating.
    ///
    /// Appends to the log (evicting the tea's oldest entries past the cap),
    /// rebuilds the tea's analytics, folds a weak/strong rating into the
    /// learned offset, and hands the record to the offline sync queue.
    pub fn record_feedback(&self, feedback: BrewFeedback) -> Result<BrewFeedback> {
        let feedback = feedback.sanitized()?;

        update_json_pair(
            self.store.as_ref(),
            [keys::FEEDBACK, keys::ANALYTICS],
            |log: &mut Vec<BrewFeedback>, analytics: &mut HashMap<String, TeaAnalytics>| {
                log.push(feedback.clone());
                *log = cap_history(std::mem::take(log), &feedback.tea_id, self.config.history_cap);
                if let Some(updated) =
                    TeaAnalytics::from_feedback(log.iter().filter(|f| f.tea_id == feedback.tea_id))
                {
                    analytics.insert(feedback.tea_id.clone(), updated);
                }
                Ok(())
            },
        )?;

        if feedback.strength != Strength::Perfect {
            let vessel_bucket = bucket(feedback.vessel_ml);
            let adjustment = strength_adjustment(feedback.strength, feedback.actual_sec);
            self.personalization.apply_offset(
                &feedback.tea_id,
                vessel_bucket,
                feedback.steep_index,
                adjustment,
            )?;
        }

        tracing::info!(
            tea_id = %feedback.tea_id,
            steep_index = feedback.steep_index,
            strength = feedback.strength.as_str(),
            enjoyment = feedback.enjoyment,
            "recorded brew feedback"
        );

        self.sync.execute_action(ActionType::FeedbackSave, &feedback)?;
        self.sync.update_cache_status(CacheKind::Analytics, true)?;

        Ok(feedback)
    }

    /// The whole feedback log, in insertion order.
    pub fn brew_feedbacks(&self) -> Result<Vec<BrewFeedback>> {
        load_json(self.store.as_ref(), keys::FEEDBACK)
    }

    /// A tea's feedback, newest first.
    pub fn feedback_for(&self, tea_id: &str) -> Result<Vec<BrewFeedback>> {
        let mut records: Vec<BrewFeedback> = self
            .brew_feedbacks()?
            .into_iter()
            .filter(|f| f.tea_id == tea_id)
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// Stored analytics for a tea, or `None` if it was never rated.
    pub fn find_tea_analytics(&self, tea_id: &str) -> Result<Option<TeaAnalytics>> {
        let mut all: HashMap<String, TeaAnalytics> = load_json(self.store.as_ref(), keys::ANALYTICS)?;
        Ok(all.remove(tea_id))
    }

    /// Stored analytics for a tea, or the zero default.
    pub fn tea_analytics(&self, tea_id: &str) -> Result<TeaAnalytics> {
        Ok(self.find_tea_analytics(tea_id)?.unwrap_or_default())
    }

    /// Suggest time and temperature changes from the most recent ratings.
    pub fn recommended_adjustments(&self, tea_id: &str) -> Result<Recommendation> {
        let mut recent = self.feedback_for(tea_id)?;
        recent.truncate(self.config.recent_window);
        Ok(recommend(&recent))
    }
}

/// Keep the newest `cap` records of one tea; other teas are untouched.
fn cap_history(log: Vec<BrewFeedback>, tea_id: &str, cap: usize) -> Vec<BrewFeedback> {
    let (mut tea, others): (Vec<_>, Vec<_>) = log.into_iter().partition(|f| f.tea_id == tea_id);
    if tea.len() <= cap {
        // Preserve insertion order when nothing is evicted.
        let mut log = others;
        log.extend(tea);
        return log;
    }
    let evicted = tea.len() - cap;
    tea.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    tea.truncate(cap);
    tracing::debug!(tea_id, evicted, "evicted old feedback");

    let mut log = others;
    log.extend(tea);
    log
}

/// Build a recommendation from a tea's most recent ratings, newest first.
pub fn recommend(recent: &[BrewFeedback]) -> Recommendation {
    if recent.len() < 2 {
        return Recommendation {
            time_adjustment: TimeAdjustment::NotEnoughData,
            temp_adjustment: TempAdjustment::NotEnoughData,
            confidence: 0,
        };
    }

    let mut counts = StrengthCounts::default();
    for f in recent {
        counts.add(f.strength);
    }
    let mean_sec = recent.iter().map(|f| f.actual_sec).sum::<f64>() / recent.len() as f64;

    let (time_adjustment, temp_adjustment) = if counts.weak > counts.strong && counts.weak > 1 {
        (
            TimeAdjustment::Increase {
                seconds: round_half_up(mean_sec * 0.1) as u32,
            },
            TempAdjustment::Raise,
        )
    } else if counts.strong > counts.weak && counts.strong > 1 {
        (
            TimeAdjustment::Reduce {
                seconds: round_half_up(mean_sec * 0.08) as u32,
            },
            TempAdjustment::Lower,
        )
    } else {
        (TimeAdjustment::Maintain, TempAdjustment::Maintain)
    };

    let confidence = round_half_up(recent.len() as f64 / FULL_CONFIDENCE_SAMPLES * 100.0).min(100.0) as u8;

    Recommendation {
        time_adjustment,
        temp_adjustment,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckets::VesselBucket;
    use crate::storage::{MemoryStore, SyncConfig};
    use crate::sync::LogSink;
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        personalization: Arc<PersonalizationStore>,
        feedback: FeedbackAnalytics,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let personalization = Arc::new(PersonalizationStore::new(store.clone()));
        let sync = Arc::new(OfflineSync::new(
            store.clone(),
            Arc::new(LogSink),
            SyncConfig::default(),
        ));
        let feedback = FeedbackAnalytics::new(
            store.clone(),
            personalization.clone(),
            sync,
            FeedbackConfig::default(),
        );
        Fixture {
            store,
            personalization,
            feedback,
        }
    }

    fn rating(tea_id: &str, strength: Strength) -> NewBrewFeedback {
        NewBrewFeedback {
            tea_id: tea_id.to_string(),
            steep_index: 0,
            vessel_ml: 110.0,
            temp_c: 80.0,
            actual_sec: 60.0,
            strength,
            enjoyment: 4,
        }
    }

    #[test]
    fn saves_feedback_and_updates_analytics() {
        let f = fixture();
        f.feedback.save_brew_feedback(rating("green", Strength::Perfect)).unwrap();

        let raw = f.store.get(keys::FEEDBACK).unwrap().unwrap();
        assert!(raw.contains("green"));

        let analytics = f.feedback.tea_analytics("green").unwrap();
        assert_eq!(analytics.total_brews, 1);
        assert_eq!(analytics.improvements, 1);
        assert_eq!(analytics.average_temp, 80.0);
        assert!(analytics.last_feedback.is_some());
        // perfect ratings teach nothing
        assert_eq!(f.personalization.offset("green", VesselBucket::Medium, 0).unwrap(), None);
    }

    #[test]
    fn weak_feedback_lengthens_the_learned_offset() {
        let f = fixture();
        f.feedback.save_brew_feedback(rating("green", Strength::Weak)).unwrap();
        // delta = max(5, 6) = 6 -> round(1.8) = 2
        assert_eq!(f.personalization.offset("green", VesselBucket::Medium, 0).unwrap(), Some(2));
    }

    #[test]
    fn three_weak_ratings_converge_upwards() {
        let f = fixture();
        let mut seen = Vec::new();
        for _ in 0..3 {
            f.feedback.save_brew_feedback(rating("green", Strength::Weak)).unwrap();
            seen.push(f.personalization.offset("green", VesselBucket::Medium, 0).unwrap().unwrap());
        }
        assert_eq!(seen, vec![2, 3, 4]);
    }

    #[test]
    fn strong_feedback_uses_minimum_adjustment() {
        let f = fixture();
        let mut short = rating("black", Strength::Strong);
        short.actual_sec = 20.0;
        short.vessel_ml = 150.0;
        f.feedback.save_brew_feedback(short).unwrap();
        // delta = -max(5, 2) = -5 -> round(-1.5) = -1
        assert_eq!(f.personalization.offset("black", VesselBucket::Large, 0).unwrap(), Some(-1));
    }

    #[test]
    fn limits_feedback_history_per_tea() {
        let f = fixture();
        let start = Utc::now() - Duration::days(1);
        // insert out of order so eviction has to sort
        for i in (0..150).rev() {
            let record = rating("green", Strength::Perfect).at(start + Duration::seconds(i));
            f.feedback.record_feedback(record).unwrap();
        }
        f.feedback.save_brew_feedback(rating("black", Strength::Perfect)).unwrap();

        let green = f.feedback.feedback_for("green").unwrap();
        assert_eq!(green.len(), 100);
        assert_eq!(green[0].timestamp, start + Duration::seconds(149));
        assert_eq!(green[99].timestamp, start + Duration::seconds(50));
        assert_eq!(f.feedback.feedback_for("black").unwrap().len(), 1);
        assert_eq!(f.feedback.tea_analytics("green").unwrap().total_brews, 100);
    }

    #[test]
    fn concurrent_writers_keep_log_and_analytics_in_step() {
        let f = fixture();
        let store: Arc<dyn KvStore> = f.store.clone();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sync = Arc::new(OfflineSync::new(
                    Arc::clone(&store),
                    Arc::new(LogSink),
                    SyncConfig::default(),
                ));
                let writer = FeedbackAnalytics::new(
                    Arc::clone(&store),
                    Arc::new(PersonalizationStore::new(Arc::clone(&store))),
                    sync,
                    FeedbackConfig::default(),
                );
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        writer.save_brew_feedback(rating("puerh", Strength::Perfect)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(f.feedback.feedback_for("puerh").unwrap().len(), 20);
        assert_eq!(f.feedback.tea_analytics("puerh").unwrap().total_brews, 20);
    }

    #[test]
    fn returns_default_analytics_for_unknown_tea() {
        let f = fixture();
        assert_eq!(f.feedback.tea_analytics("unknown").unwrap(), TeaAnalytics::default());
        assert!(f.feedback.find_tea_analytics("unknown").unwrap().is_none());
    }

    #[test]
    fn preferred_strength_ties_prefer_perfect_then_weak() {
        let at = Utc::now();
        let records = vec![
            rating("t", Strength::Weak).at(at),
            rating("t", Strength::Strong).at(at),
        ];
        let a = TeaAnalytics::from_feedback(&records).unwrap();
        assert_eq!(a.preferred_strength, Strength::Weak);

        let records = vec![
            rating("t", Strength::Weak).at(at),
            rating("t", Strength::Perfect).at(at),
        ];
        let a = TeaAnalytics::from_feedback(&records).unwrap();
        assert_eq!(a.preferred_strength, Strength::Perfect);
    }

    #[test]
    fn enjoyment_is_clamped_and_nan_rejected() {
        let f = fixture();
        let mut r = rating("green", Strength::Perfect);
        r.enjoyment = 8;
        assert_eq!(f.feedback.save_brew_feedback(r).unwrap().enjoyment, 5);

        let mut r = rating("green", Strength::Perfect);
        r.vessel_ml = f64::NAN;
        assert!(f.feedback.save_brew_feedback(r).is_err());
        assert_eq!(f.feedback.feedback_for("green").unwrap().len(), 1);
    }

    #[test]
    fn no_adjustments_for_insufficient_data() {
        let f = fixture();
        let rec = f.feedback.recommended_adjustments("green").unwrap();
        assert_eq!(rec.confidence, 0);
        assert_eq!(rec.time_adjustment.to_string(), "No adjustments yet");
        assert_eq!(rec.temp_adjustment.to_string(), "No adjustments yet");

        f.feedback.save_brew_feedback(rating("green", Strength::Weak)).unwrap();
        assert_eq!(f.feedback.recommended_adjustments("green").unwrap().confidence, 0);
    }

    #[test]
    fn recommends_increasing_time_for_weak_tea() {
        let f = fixture();
        for _ in 0..5 {
            f.feedback.save_brew_feedback(rating("green", Strength::Weak)).unwrap();
        }
        let rec = f.feedback.recommended_adjustments("green").unwrap();
        assert_eq!(rec.time_adjustment, TimeAdjustment::Increase { seconds: 6 });
        assert!(rec.time_adjustment.to_string().contains("Increase steep time"));
        assert!(rec.temp_adjustment.to_string().contains("raising temperature"));
        assert_eq!(rec.confidence, 50);
    }

    #[test]
    fn recommends_reducing_time_for_strong_tea() {
        let f = fixture();
        for _ in 0..5 {
            f.feedback.save_brew_feedback(rating("green", Strength::Strong)).unwrap();
        }
        let rec = f.feedback.recommended_adjustments("green").unwrap();
        assert_eq!(rec.time_adjustment, TimeAdjustment::Reduce { seconds: 5 });
        assert!(rec.temp_adjustment.to_string().contains("lowering temperature"));
    }

    #[test]
    fn mixed_ratings_maintain() {
        let at = Utc::now();
        let recent = vec![
            rating("t", Strength::Weak).at(at),
            rating("t", Strength::Strong).at(at),
            rating("t", Strength::Perfect).at(at),
        ];
        let rec = recommend(&recent);
        assert_eq!(rec.time_adjustment, TimeAdjustment::Maintain);
        assert_eq!(rec.temp_adjustment, TempAdjustment::Maintain);
        assert_eq!(rec.confidence, 30);
    }

    #[test]
    fn only_the_recent_window_counts() {
        let f = fixture();
        let start = Utc::now() - Duration::hours(1);
        for i in 0..5 {
            let r = rating("oolong", Strength::Strong).at(start + Duration::seconds(i));
            f.feedback.record_feedback(r).unwrap();
        }
        for i in 5..10 {
            let r = rating("oolong", Strength::Perfect).at(start + Duration::seconds(i));
            f.feedback.record_feedback(r).unwrap();
        }
        let rec = f.feedback.recommended_adjustments("oolong").unwrap();
        assert_eq!(rec.time_adjustment, TimeAdjustment::Maintain);
    }
}
