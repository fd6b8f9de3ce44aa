//! Domain model for the hydration tracker.
//!
//! This module defines the user [`Profile`], the [`WaterLogEntry`] records
//! and the persisted [`Dataset`] root that the [`DataStore`] writes to disk.
//! It also owns the daily target formula and the per-gender bonus table.
//!
//! # Persisted shape
//!
//! ```json
//! {
//!   "profile": { "height_cm": 180, "weight_kg": 80.0, "age_years": 30, "gender": "MALE" },
//!   "water_logs": [ { "amount_ml": 250, "timestamp": 1622548800.0, "note": "Morning" } ],
//!   "checksum": "9f2c..."
//! }
//! ```
//!
//! [`DataStore`]: crate::tracker_store::DataStore

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Gender options used by the daily target formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Bonus coefficient (litres) added to the daily target for each gender.
///
/// FEMALE carries 0.10. An older build used 0.0 here; change this row to
/// switch tables.
pub const GENDER_BONUS: [(Gender, f64); 3] = [
    (Gender::Male, 0.25),
    (Gender::Female, 0.10),
    (Gender::Other, 0.15),
];

impl Gender {
    /// All variants in declaration order.
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    /// The persisted, upper-case name of the variant.
    pub fn name(self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }

    /// Looks up the bonus coefficient in [`GENDER_BONUS`].
    pub fn bonus(self) -> f64 {
        GENDER_BONUS
            .iter()
            .find(|(gender, _)| *gender == self)
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0.0)
    }

    /// Matches an exact persisted name (`"MALE"`, `"FEMALE"`, `"OTHER"`).
    pub fn from_name(name: &str) -> Option<Gender> {
        Gender::ALL.into_iter().find(|g| g.name() == name)
    }

    /// Comma separated list of valid names, used in validation messages.
    pub fn valid_names() -> String {
        Gender::ALL
            .iter()
            .map(|g| g.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gender {
    type Err = String;

    /// Case-insensitive parse of user input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::from_name(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| format!("Invalid gender. Must be one of: {}.", Gender::valid_names()))
    }
}

/// The user's biometrics. Exactly zero or one profile exists at a time.
///
/// ```rust
/// use water_tracker_core::tracker_model::{Gender, Profile};
///
/// let profile = Profile { height_cm: 180, weight_kg: 80.0, age_years: 30, gender: Gender::Male };
/// assert_eq!(profile.daily_target_ml(), 3404);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub height_cm: u32,
    pub weight_kg: f64,
    pub age_years: u32,
    pub gender: Gender,
}

impl Profile {
    /// Daily water target in millilitres:
    /// `round(((0.035*w) + (0.002*h) - (0.0002*a) + bonus) * 1000)`.
    ///
    /// Halves round to even.
    pub fn daily_target_ml(&self) -> u32 {
        let litres = (0.035 * self.weight_kg) + (0.002 * f64::from(self.height_cm))
            - (0.0002 * f64::from(self.age_years))
            + self.gender.bonus();
        let ml = (litres * 1000.0).round_ties_even();
        if ml <= 0.0 {
            0
        } else if ml >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            ml as u32
        }
    }
}

/// One water consumption event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterLogEntry {
    pub amount_ml: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Profile as it sits in the dataset file.
///
/// The gender stays a plain string here so that an unknown name does not
/// make the whole document unreadable; [`DataStore::load_profile`] maps it.
///
/// [`DataStore::load_profile`]: crate::tracker_store::DataStore::load_profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProfile {
    pub height_cm: u32,
    pub weight_kg: f64,
    pub age_years: u32,
    pub gender: String,
}

impl From<&Profile> for StoredProfile {
    fn from(profile: &Profile) -> Self {
        StoredProfile {
            height_cm: profile.height_cm,
            weight_kg: profile.weight_kg,
            age_years: profile.age_years,
            gender: profile.gender.name().to_string(),
        }
    }
}

impl TryFrom<&StoredProfile> for Profile {
    type Error = String;

    fn try_from(stored: &StoredProfile) -> Result<Self, Self::Error> {
        let gender = Gender::from_name(&stored.gender)
            .ok_or_else(|| format!("unknown gender '{}'", stored.gender))?;
        Ok(Profile {
            height_cm: stored.height_cm,
            weight_kg: stored.weight_kg,
            age_years: stored.age_years,
            gender,
        })
    }
}

/// Root object of the store file.
///
/// `checksum` is the SHA-256 of the canonical form of everything else. In
/// memory it may be stale between a mutation and the next save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub profile: Option<StoredProfile>,
    pub water_logs: Vec<WaterLogEntry>,
    #[serde(default)]
    pub checksum: String,
}
