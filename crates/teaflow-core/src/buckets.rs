//! Vessel size classification.
//!
//! Learned offsets are keyed by a coarse vessel bucket rather than the exact
//! volume, so a 100 ml gaiwan and a 110 ml pot share what they learn.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed vessel sizes offered by the picker, ascending.
pub const VESSEL_STEPS: [u32; 7] = [70, 90, 110, 130, 150, 180, 200];

/// Coarse vessel-size class used as a personalization key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VesselBucket {
    #[serde(rename = "≤80")]
    Small,
    #[serde(rename = "81–120")]
    Medium,
    #[serde(rename = "≥121")]
    Large,
}

impl VesselBucket {
    pub fn label(self) -> &'static str {
        match self {
            VesselBucket::Small => "≤80",
            VesselBucket::Medium => "81–120",
            VesselBucket::Large => "≥121",
        }
    }
}

impl fmt::Display for VesselBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a vessel volume in ml. Boundaries are inclusive on the upper side.
pub fn bucket(vessel_ml: f64) -> VesselBucket {
    if vessel_ml <= 80.0 {
        VesselBucket::Small
    } else if vessel_ml <= 120.0 {
        VesselBucket::Medium
    } else {
        VesselBucket::Large
    }
}

/// Snap a volume to the nearest entry of [`VESSEL_STEPS`].
///
/// On an exact tie the smaller step wins.
pub fn snap_vessel(v: f64) -> u32 {
    let mut best = VESSEL_STEPS[0];
    let mut best_distance = f64::INFINITY;
    for step in VESSEL_STEPS {
        let distance = (f64::from(step) - v).abs();
        if distance < best_distance {
            best_distance = distance;
            best = step;
        }
    }
    best
}
