//! Profile validation and daily target lookup.

use log::info;

use crate::app_response::AppResponse;
use crate::tracker_model::{Gender, Profile};
use crate::tracker_store::DataStore;

/// Validates profile input and mediates it against the [`DataStore`].
///
/// Borrow one from [`HydrationTracker::profiles`](crate::tracker::HydrationTracker::profiles)
/// or build it directly over a store.
pub struct ProfileService<'s> {
    store: &'s mut DataStore,
}

impl<'s> ProfileService<'s> {
    pub fn new(store: &'s mut DataStore) -> Self {
        Self { store }
    }

    pub fn get_profile(&self) -> Option<Profile> {
        self.store.load_profile()
    }

    pub fn has_profile(&self) -> bool {
        self.store.load_profile().is_some()
    }

    /// Validates the raw input, builds the profile and persists it.
    ///
    /// Each measurement must be positive; `gender` is matched
    /// case-insensitively against `MALE`, `FEMALE` and `OTHER`. Validation
    /// failures leave the stored profile untouched. A failed write is a
    /// [`AppResponse::StorageError`].
    pub fn create_profile(
        &mut self,
        height_cm: i64,
        weight_kg: f64,
        age_years: i64,
        gender: &str,
    ) -> Result<Profile, AppResponse> {
        let height_cm = positive_u32(height_cm, "Height", "cm")?;
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(AppResponse::ValidationError(
                "Weight must be greater than 0 kg.".to_string(),
            ));
        }
        let age_years = positive_u32(age_years, "Age", "years")?;
        let gender: Gender = gender.parse().map_err(AppResponse::ValidationError)?;

        let profile = Profile {
            height_cm,
            weight_kg,
            age_years,
            gender,
        };

        if !self.store.save_profile(&profile) {
            return Err(AppResponse::StorageError("Failed to save profile.".to_string()));
        }

        info!(
            "Profile saved: {} cm, {} kg, {} years, {} (target {} ml)",
            profile.height_cm,
            profile.weight_kg,
            profile.age_years,
            profile.gender,
            profile.daily_target_ml()
        );
        Ok(profile)
    }

    /// Replaces the whole profile; same contract as [`create_profile`](Self::create_profile).
    pub fn update_profile(
        &mut self,
        height_cm: i64,
        weight_kg: f64,
        age_years: i64,
        gender: &str,
    ) -> Result<Profile, AppResponse> {
        self.create_profile(height_cm, weight_kg, age_years, gender)
    }

    /// Daily target in millilitres, or 0 without a profile.
    pub fn get_daily_target(&self) -> u32 {
        self.get_profile()
            .map(|profile| profile.daily_target_ml())
            .unwrap_or(0)
    }
}

/// Checks `value > 0` and that it fits the `u32` model field.
pub(crate) fn positive_u32(value: i64, label: &str, unit: &str) -> Result<u32, AppResponse> {
    if value <= 0 {
        return Err(AppResponse::ValidationError(format!(
            "{label} must be greater than 0 {unit}."
        )));
    }
    u32::try_from(value).map_err(|_| {
        AppResponse::ValidationError(format!("{label} must be at most {} {unit}.", u32::MAX))
    })
}
