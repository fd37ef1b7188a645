//! Tea profiles and the built-in library.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Steep sequence used when a profile carries no schedule of its own.
pub const FALLBACK_SCHEDULE_SEC: [u32; 11] = [7, 9, 12, 15, 20, 25, 35, 45, 60, 90, 120];

/// Leaf-to-water ratio used when a profile's ratio is unusable.
pub const FALLBACK_RATIO: f64 = 1.0 / 15.0;

/// Longest steep a user-created profile may declare, in seconds.
pub const MAX_STEEP_SEC: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeaType {
    Green,
    Black,
    Oolong,
    White,
    Puerh,
    Herbal,
    Custom,
}

impl TeaType {
    pub fn as_str(self) -> &'static str {
        match self {
            TeaType::Green => "green",
            TeaType::Black => "black",
            TeaType::Oolong => "oolong",
            TeaType::White => "white",
            TeaType::Puerh => "puerh",
            TeaType::Herbal => "herbal",
            TeaType::Custom => "custom",
        }
    }
}

impl fmt::Display for TeaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeaType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "green" => Ok(TeaType::Green),
            "black" => Ok(TeaType::Black),
            "oolong" => Ok(TeaType::Oolong),
            "white" => Ok(TeaType::White),
            "puerh" | "pu-erh" => Ok(TeaType::Puerh),
            "herbal" => Ok(TeaType::Herbal),
            "custom" => Ok(TeaType::Custom),
            other => Err(ValidationError::value("type", format!("unknown tea type '{other}'"))),
        }
    }
}

/// A brewable tea.
///
/// Profiles are treated as immutable once a brew session starts; edits
/// produce a new saved version under the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeaProfile {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub tea_type: TeaType,
    pub base_temp_c: f64,
    /// Leaf grams per ml of water, e.g. 1/15.
    pub default_ratio: f64,
    #[serde(default)]
    pub base_schedule_sec: Vec<u32>,
    /// Set on profiles the user created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<bool>,
}

impl TeaProfile {
    pub fn is_user(&self) -> bool {
        self.user.unwrap_or(false)
    }

    /// The schedule to brew from, falling back when none is stored.
    pub fn schedule_or_fallback(&self) -> &[u32] {
        if self.base_schedule_sec.is_empty() {
            &FALLBACK_SCHEDULE_SEC[..]
        } else {
            self.base_schedule_sec.as_slice()
        }
    }

    /// The ratio to brew from, falling back when unusable.
    pub fn ratio_or_fallback(&self) -> f64 {
        if self.default_ratio.is_finite() && self.default_ratio > 0.0 {
            self.default_ratio
        } else {
            FALLBACK_RATIO
        }
    }

    /// Check a user-created profile before it is saved.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::value("id", "must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::value("name", "must not be empty"));
        }
        if !(60.0..=100.0).contains(&self.base_temp_c) {
            return Err(ValidationError::value(
                "baseTempC",
                format!("{} is outside 60-100 °C", self.base_temp_c),
            ));
        }
        if !(self.default_ratio > 0.0 && self.default_ratio <= 1.0) {
            return Err(ValidationError::value(
                "defaultRatio",
                format!("{} is outside (0, 1]", self.default_ratio),
            ));
        }
        if self.base_schedule_sec.is_empty() {
            return Err(ValidationError::value("baseScheduleSec", "must have at least one steep"));
        }
        if let Some(bad) = self
            .base_schedule_sec
            .iter()
            .find(|&&s| s == 0 || s > MAX_STEEP_SEC)
        {
            return Err(ValidationError::value(
                "baseScheduleSec",
                format!("steep of {bad}s is outside 1-{MAX_STEEP_SEC}s"),
            ));
        }
        Ok(())
    }
}

fn builtin(
    id: &str,
    name: &str,
    tea_type: TeaType,
    base_temp_c: f64,
    default_ratio: f64,
    schedule: &[u32],
) -> TeaProfile {
    TeaProfile {
        id: id.to_string(),
        name: name.to_string(),
        tea_type,
        base_temp_c,
        default_ratio,
        base_schedule_sec: schedule.to_vec(),
        user: None,
    }
}

/// The six profiles every install starts with.
pub fn builtin_teas() -> Vec<TeaProfile> {
    vec![
        builtin("oolong", "Oolong", TeaType::Oolong, 92.0, 1.0 / 15.0, &FALLBACK_SCHEDULE_SEC),
        builtin(
            "puerh",
            "Pu-erh",
            TeaType::Puerh,
            98.0,
            1.0 / 15.0,
            &[5, 7, 9, 12, 15, 20, 25, 35, 45, 60, 90, 120],
        ),
        builtin("green", "Green", TeaType::Green, 78.0, 1.0 / 20.0, &[5, 7, 10, 15, 20, 25]),
        builtin("white", "White", TeaType::White, 82.0, 1.0 / 18.0, &[8, 10, 15, 20, 25, 35]),
        builtin("black", "Black", TeaType::Black, 95.0, 1.0 / 16.0, &[8, 10, 15, 20, 25, 35]),
        builtin("herbal", "Herbal", TeaType::Herbal, 100.0, 1.0 / 12.0, &[300]),
    ]
}

/// Look up a built-in profile by id.
pub fn find_builtin(id: &str) -> Option<TeaProfile> {
    builtin_teas().into_iter().find(|t| t.id == id)
}
