//! Steep schedule computation.
//!
//! The base schedule of a tea is scaled by two multipliers and then
//! corrected by whatever the personalization store has learned:
//!
//! 1. **Ratio**: leaf density relative to the tea's default ratio, raised to
//!    0.8 so doubling the leaf does not double the time, clamped to [0.6, 1.6].
//! 2. **Temperature**: cooler-than-ideal water lengthens steeps by 12% per
//!    5 °C (capped at 1.5); hotter water shortens them by 8% per 5 °C
//!    (floored at 0.7).
//! 3. **Exhaustion**: from the 7th steep on, a further 6%.
//! 4. **Learned offsets** for the tea and vessel bucket, floored at 1 s.

use serde::{Deserialize, Serialize};

use crate::buckets::bucket;
use crate::error::{ensure_finite, Result, ValidationError};
use crate::learning::PersonalizationStore;
use crate::numeric::{clamp, round_half_up};
use crate::tea::TeaProfile;

const RATIO_EXPONENT: f64 = 0.8;
const RATIO_MULT_MIN: f64 = 0.6;
const RATIO_MULT_MAX: f64 = 1.6;

const COOL_GAIN_PER_5C: f64 = 0.12;
const COOL_MULT_MAX: f64 = 1.5;
const HOT_LOSS_PER_5C: f64 = 0.08;
const HOT_MULT_MIN: f64 = 0.7;

/// Steep index from which leaves count as tiring.
const EXHAUSTION_FROM_INDEX: usize = 6;
const EXHAUSTION_MULT: f64 = 1.06;

/// Brew parameters for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrewParams {
    pub vessel_ml: f64,
    pub leaf_grams: f64,
    pub temp_c: f64,
}

impl BrewParams {
    pub fn new(vessel_ml: f64, leaf_grams: f64, temp_c: f64) -> Self {
        Self {
            vessel_ml,
            leaf_grams,
            temp_c,
        }
    }

    /// Reject values no schedule can be computed from.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let vessel = ensure_finite("vesselMl", self.vessel_ml)?;
        let leaf = ensure_finite("leafGrams", self.leaf_grams)?;
        ensure_finite("tempC", self.temp_c)?;
        if vessel <= 0.0 {
            return Err(ValidationError::argument("vesselMl", format!("must be positive, got {vessel}")));
        }
        if leaf < 0.0 {
            return Err(ValidationError::argument("leafGrams", format!("must not be negative, got {leaf}")));
        }
        Ok(())
    }
}

/// A computed schedule with the intermediate factors that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBreakdown {
    pub ratio_mult: f64,
    pub temp_mult: f64,
    /// Durations before learned offsets.
    pub prelim: Vec<u32>,
    pub offsets: Vec<i32>,
    /// Final per-steep durations in seconds.
    pub steeps: Vec<u32>,
}

/// Leaf-density multiplier.
pub fn ratio_multiplier(tea: &TeaProfile, vessel_ml: f64, leaf_grams: f64) -> f64 {
    let ratio = (leaf_grams / vessel_ml) / tea.ratio_or_fallback();
    clamp(RATIO_MULT_MIN, ratio.powf(RATIO_EXPONENT), RATIO_MULT_MAX)
}

/// Water temperature multiplier. Never below 0.7 nor above 1.5, and never
/// above 1.0 when the water is at or above the tea's ideal.
pub fn temp_multiplier(tea: &TeaProfile, temp_c: f64) -> f64 {
    let ideal = if tea.base_temp_c.is_finite() {
        tea.base_temp_c
    } else {
        temp_c
    };
    let delta = ideal - temp_c;
    if delta > 0.0 {
        clamp(1.0, 1.0 + COOL_GAIN_PER_5C * (delta / 5.0), COOL_MULT_MAX)
    } else {
        clamp(HOT_MULT_MIN, 1.0 - HOT_LOSS_PER_5C * (delta.abs() / 5.0), 1.0)
    }
}

/// Durations before learned offsets are applied.
pub fn preliminary_schedule(tea: &TeaProfile, ratio_mult: f64, temp_mult: f64) -> Vec<u32> {
    tea.schedule_or_fallback()
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let exhaustion = if i >= EXHAUSTION_FROM_INDEX {
                EXHAUSTION_MULT
            } else {
                1.0
            };
            let secs = round_half_up(f64::from(t) * ratio_mult * temp_mult * exhaustion);
            secs.max(1.0) as u32
        })
        .collect()
}

/// Add learned offsets, keeping every steep at least one second long.
pub fn apply_offsets(prelim: &[u32], offsets: &[i32]) -> Vec<u32> {
    prelim
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let off = offsets.get(i).copied().unwrap_or(0);
            (i64::from(t) + i64::from(off)).max(1) as u32
        })
        .collect()
}

/// Computes per-steep durations from a tea profile and brew parameters.
pub struct ScheduleComputer<'a> {
    personalization: &'a PersonalizationStore,
}

impl<'a> ScheduleComputer<'a> {
    pub fn new(personalization: &'a PersonalizationStore) -> Self {
        Self { personalization }
    }

    /// Final steep durations in seconds, one per base steep.
    pub fn compute_schedule(
        &self,
        tea: &TeaProfile,
        vessel_ml: f64,
        leaf_grams: f64,
        temp_c: f64,
    ) -> Result<Vec<u32>> {
        Ok(self
            .breakdown(tea, BrewParams::new(vessel_ml, leaf_grams, temp_c))?
            .steeps)
    }

    /// Like [`compute_schedule`](Self::compute_schedule) but keeps the factors.
    ///
    /// A storage fault while reading offsets is logged and treated as
    /// "nothing learned"; it never prevents a schedule from being produced.
    pub fn breakdown(&self, tea: &TeaProfile, params: BrewParams) -> Result<ScheduleBreakdown> {
        params.validate()?;

        let ratio_mult = ratio_multiplier(tea, params.vessel_ml, params.leaf_grams);
        let temp_mult = temp_multiplier(tea, params.temp_c);
        let prelim = preliminary_schedule(tea, ratio_mult, temp_mult);

        let vessel_bucket = bucket(params.vessel_ml);
        let offsets = match self.personalization.offsets(&tea.id, vessel_bucket, prelim.len()) {
            Ok(offsets) => offsets,
            Err(e) => {
                tracing::warn!(
                    tea_id = %tea.id,
                    bucket = %vessel_bucket,
                    error = %e,
                    "could not read learned offsets, brewing without them"
                );
                vec![0; prelim.len()]
            }
        };
        let steeps = apply_offsets(&prelim, &offsets);

        tracing::debug!(
            tea_id = %tea.id,
            ratio_mult,
            temp_mult,
            steeps = steeps.len(),
            "computed schedule"
        );

        Ok(ScheduleBreakdown {
            ratio_mult,
            temp_mult,
            prelim,
            offsets,
            steeps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckets::VesselBucket;
    use crate::error::CoreError;
    use crate::storage::{KvStore, MemoryStore};
    use crate::tea::{find_builtin, TeaType};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn oolong() -> TeaProfile {
        find_builtin("oolong").unwrap()
    }

    fn personalization() -> PersonalizationStore {
        PersonalizationStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn neutral_brew_only_applies_exhaustion() {
        let p = personalization();
        let steeps = ScheduleComputer::new(&p)
            .compute_schedule(&oolong(), 110.0, 7.33, 92.0)
            .unwrap();
        assert_eq!(steeps, vec![7, 9, 12, 15, 20, 25, 37, 48, 64, 95, 127]);
    }

    #[test]
    fn breakdown_reports_multipliers() {
        let p = personalization();
        let b = ScheduleComputer::new(&p)
            .breakdown(&oolong(), BrewParams::new(110.0, 7.33, 92.0))
            .unwrap();
        assert!((b.ratio_mult - 1.0).abs() < 0.01);
        assert_eq!(b.temp_mult, 1.0);
        assert_eq!(b.prelim, b.steeps);
        assert_eq!(b.offsets, vec![0; 11]);
    }

    #[test]
    fn learned_offsets_are_added_and_floored() {
        let p = personalization();
        for _ in 0..30 {
            p.apply_offset("oolong", VesselBucket::Medium, 0, -60.0).unwrap();
            p.apply_offset("oolong", VesselBucket::Medium, 1, 20.0).unwrap();
        }
        let steeps = ScheduleComputer::new(&p)
            .compute_schedule(&oolong(), 110.0, 7.33, 92.0)
            .unwrap();
        assert_eq!(steeps[0], 1);
        assert_eq!(steeps[1], 9 + p.offset("oolong", VesselBucket::Medium, 1).unwrap().unwrap() as u32);
        // a different bucket sees nothing
        let small = ScheduleComputer::new(&p)
            .compute_schedule(&oolong(), 70.0, 70.0 / 15.0, 92.0)
            .unwrap();
        assert_eq!(small[0], 7);
    }

    #[test]
    fn ratio_multiplier_is_clamped() {
        let tea = oolong();
        assert_eq!(ratio_multiplier(&tea, 100.0, 100.0), RATIO_MULT_MAX);
        assert_eq!(ratio_multiplier(&tea, 100.0, 0.1), RATIO_MULT_MIN);
        // 50% more leaf grows time sub-linearly
        let denser = ratio_multiplier(&tea, 150.0, 15.0);
        assert!((denser - 1.5f64.powf(0.8)).abs() < 1e-9);
        assert!(denser < 1.5);
    }

    #[test]
    fn cooler_water_brews_longer() {
        let tea = oolong();
        assert!((temp_multiplier(&tea, 87.0) - 1.12).abs() < 1e-9);
        assert_eq!(temp_multiplier(&tea, 40.0), COOL_MULT_MAX);
    }

    #[test]
    fn hotter_water_brews_shorter() {
        let mut tea = oolong();
        tea.base_temp_c = 85.0;
        assert!((temp_multiplier(&tea, 95.0) - 0.84).abs() < 1e-9);
        assert_eq!(temp_multiplier(&tea, 200.0), HOT_MULT_MIN);
    }

    #[test]
    fn empty_profile_falls_back_to_default_schedule() {
        let p = personalization();
        let tea = TeaProfile {
            id: "mystery".into(),
            name: "Mystery".into(),
            tea_type: TeaType::Custom,
            base_temp_c: 92.0,
            default_ratio: 0.0,
            base_schedule_sec: vec![],
            user: Some(true),
        };
        let steeps = ScheduleComputer::new(&p)
            .compute_schedule(&tea, 110.0, 7.33, 92.0)
            .unwrap();
        assert_eq!(steeps, vec![7, 9, 12, 15, 20, 25, 37, 48, 64, 95, 127]);
    }

    #[test]
    fn rejects_unusable_numbers() {
        let p = personalization();
        let computer = ScheduleComputer::new(&p);
        let tea = oolong();
        for (v, l, t) in [
            (f64::NAN, 7.0, 92.0),
            (0.0, 7.0, 92.0),
            (-10.0, 7.0, 92.0),
            (110.0, f64::INFINITY, 92.0),
            (110.0, -1.0, 92.0),
            (110.0, 7.0, f64::NAN),
        ] {
            let err = computer.compute_schedule(&tea, v, l, t).unwrap_err();
            assert!(matches!(
                err,
                CoreError::Validation(ValidationError::InvalidArgument { .. })
            ));
        }
    }

    struct BrokenStore;

    impl KvStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, crate::error::StorageError> {
            Err(crate::error::StorageError::Locked)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), crate::error::StorageError> {
            Err(crate::error::StorageError::Locked)
        }
        fn remove(&self, _key: &str) -> Result<(), crate::error::StorageError> {
            Err(crate::error::StorageError::Locked)
        }
        fn keys(&self) -> Result<Vec<String>, crate::error::StorageError> {
            Err(crate::error::StorageError::Locked)
        }
        fn update(&self, _keys: &[&str], _f: &mut crate::storage::UpdateFn<'_>) -> Result<()> {
            Err(crate::error::StorageError::Locked.into())
        }
        fn remove_matching(&self, _pred: &dyn Fn(&str) -> bool) -> Result<usize> {
            Err(crate::error::StorageError::Locked.into())
        }
    }

    #[test]
    fn storage_fault_does_not_block_the_brew() {
        let p = PersonalizationStore::new(Arc::new(BrokenStore));
        let steeps = ScheduleComputer::new(&p)
            .compute_schedule(&oolong(), 110.0, 7.33, 92.0)
            .unwrap();
        assert_eq!(steeps.len(), 11);
        assert_eq!(steeps[0], 7);
    }

    proptest! {
        #[test]
        fn hotter_water_never_lengthens(base in 60.0f64..100.0, hotter in 0.0f64..60.0) {
            let mut tea = oolong();
            tea.base_temp_c = base;
            let m = temp_multiplier(&tea, base + hotter);
            prop_assert!(m <= 1.0);
            prop_assert!(m >= HOT_MULT_MIN);
        }

        #[test]
        fn cooler_water_stays_in_bounds(base in 60.0f64..100.0, cooler in 0.0f64..80.0) {
            let mut tea = oolong();
            tea.base_temp_c = base;
            let m = temp_multiplier(&tea, base - cooler);
            prop_assert!(m >= 1.0);
            prop_assert!(m <= COOL_MULT_MAX);
        }

        #[test]
        fn identical_inputs_give_identical_schedules(
            vessel in 30.0f64..300.0,
            leaf in 0.0f64..30.0,
            temp in 60.0f64..100.0,
        ) {
            let p = personalization();
            p.apply_offset("oolong", bucket(vessel), 2, 12.0).unwrap();
            let computer = ScheduleComputer::new(&p);
            let a = computer.compute_schedule(&oolong(), vessel, leaf, temp).unwrap();
            let b = computer.compute_schedule(&oolong(), vessel, leaf, temp).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.len(), 11);
            prop_assert!(a.iter().all(|&s| s >= 1));
        }
    }
}
