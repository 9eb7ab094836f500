//! Difficulty profile derived from calibration
//!
//! The profile is the only thing that crosses from Calibration into Play. A
//! profile stored by an external menu can be supplied instead, as long as it
//! satisfies the same field constraints.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;
use crate::{Millis, clamp_range};

/// Tuning parameters for one player, fixed for the duration of a round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyProfile {
    pub average_reaction_time_ms: f64,
    /// Early presses per stimulus shown, 0..1
    pub impulse_ratio: f64,
    pub window_size_ms: f64,
    pub enemy_speed_factor: f64,
    pub penalty_duration_ms: f64,
}

/// A stored profile that violates the documented ranges
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl DifficultyProfile {
    /// Derive a profile from calibration measurements.
    ///
    /// More impulsive or slower players get a larger forgiveness window; the
    /// more impulsive the player, the faster the formation and the longer the
    /// penalty lockout. The tuning fields use the raw ratio; the stored
    /// `impulse_ratio` is clamped to [0, 1].
    pub fn derive(average_reaction_time_ms: f64, impulse_ratio: f64) -> Self {
        let window_size_ms = clamp_range(
            400.0 + impulse_ratio * 300.0 - average_reaction_time_ms * 0.2,
            WINDOW_SIZE_RANGE_MS,
        );
        let enemy_speed_factor = clamp_range(1.0 + impulse_ratio * 1.2, ENEMY_SPEED_RANGE);
        let penalty_duration_ms = clamp_range(300.0 + impulse_ratio * 400.0, PENALTY_RANGE_MS);

        Self {
            average_reaction_time_ms,
            impulse_ratio: impulse_ratio.clamp(0.0, 1.0),
            window_size_ms,
            enemy_speed_factor,
            penalty_duration_ms,
        }
    }

    /// Check a profile that did not come from [`DifficultyProfile::derive`]
    pub fn validate(&self) -> Result<(), ProfileError> {
        check("averageReactionTimeMs", self.average_reaction_time_ms, (0.0, f64::MAX))?;
        check("impulseRatio", self.impulse_ratio, (0.0, 1.0))?;
        check("windowSizeMs", self.window_size_ms, WINDOW_SIZE_RANGE_MS)?;
        check("enemySpeedFactor", self.enemy_speed_factor, ENEMY_SPEED_RANGE)?;
        check("penaltyDurationMs", self.penalty_duration_ms, PENALTY_RANGE_MS)?;
        Ok(())
    }

    /// Parse and validate a stored profile
    pub fn from_json(json: &str) -> Result<Self, StoredProfileError> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Window duration as a timer delay
    pub fn window_ms(&self) -> Millis {
        self.window_size_ms.round() as Millis
    }

    pub fn penalty_ms(&self) -> Millis {
        self.penalty_duration_ms.round() as Millis
    }

    /// Formation lock-step interval before score effects are applied
    pub fn base_step_interval_ms(&self) -> f64 {
        BASE_STEP_INTERVAL_MS / self.enemy_speed_factor
    }
}

/// Failure to load a stored profile
#[derive(Debug, Error)]
pub enum StoredProfileError {
    #[error("malformed profile: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid profile: {0}")]
    Invalid(#[from] ProfileError),
}

fn check(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), ProfileError> {
    if !value.is_finite() {
        return Err(ProfileError::NotFinite { field });
    }
    if value < min || value > max {
        return Err(ProfileError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_derive_reference_player() {
        let p = DifficultyProfile::derive(330.0, 0.4);
        assert!(approx(p.window_size_ms, 454.0));
        assert!(approx(p.enemy_speed_factor, 1.48));
        assert!(approx(p.penalty_duration_ms, 460.0));
        assert_eq!(p.window_ms(), 454);
        assert_eq!(p.penalty_ms(), 460);
    }

    #[test]
    fn test_derive_clamps_extremes() {
        // Very fast, never impulsive: window would be 400 - 0 = 400
        let calm = DifficultyProfile::derive(0.0, 0.0);
        assert!(approx(calm.window_size_ms, 400.0));
        assert!(approx(calm.enemy_speed_factor, 1.0));
        assert!(approx(calm.penalty_duration_ms, 300.0));

        // Very slow player hits the lower window bound
        let slow = DifficultyProfile::derive(5000.0, 0.0);
        assert!(approx(slow.window_size_ms, 200.0));
    }

    #[test]
    fn test_ratio_above_one_drives_tuning_uncapped() {
        // Twice as many early presses as stimuli
        let p = DifficultyProfile::derive(300.0, 2.0);
        assert_eq!(p.impulse_ratio, 1.0);
        assert!(approx(p.enemy_speed_factor, 2.5));
        assert!(approx(p.window_size_ms, 800.0));
        assert!(approx(p.penalty_duration_ms, 1000.0));
        assert!(p.validate().is_ok());

        // Just over 1: the speed factor differs from a capped ratio
        let q = DifficultyProfile::derive(300.0, 1.2);
        assert!(approx(q.enemy_speed_factor, 2.44));
        assert!(approx(q.penalty_duration_ms, 780.0));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut p = DifficultyProfile::derive(300.0, 0.2);
        assert!(p.validate().is_ok());

        p.window_size_ms = 900.0;
        assert!(matches!(
            p.validate(),
            Err(ProfileError::OutOfRange {
                field: "windowSizeMs",
                ..
            })
        ));

        p.window_size_ms = f64::NAN;
        assert!(matches!(p.validate(), Err(ProfileError::NotFinite { .. })));
    }

    #[test]
    fn test_from_json_accepts_stored_profile() {
        let json = r#"{
            "averageReactionTimeMs": 280.0,
            "impulseRatio": 0.1,
            "windowSizeMs": 374.0,
            "enemySpeedFactor": 1.12,
            "penaltyDurationMs": 340.0
        }"#;
        let p = DifficultyProfile::from_json(json).unwrap();
        assert_eq!(p.window_ms(), 374);

        let bad = json.replace("1.12", "3.0");
        assert!(matches!(
            DifficultyProfile::from_json(&bad),
            Err(StoredProfileError::Invalid(_))
        ));
        assert!(matches!(
            DifficultyProfile::from_json("{"),
            Err(StoredProfileError::Json(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_derived_fields_stay_in_range(ratio in 0.0f64..=4.0, rt in 0.0f64..10_000.0) {
            let p = DifficultyProfile::derive(rt, ratio);
            prop_assert!(p.window_size_ms >= 200.0 && p.window_size_ms <= 800.0);
            prop_assert!(p.enemy_speed_factor >= 0.8 && p.enemy_speed_factor <= 2.5);
            prop_assert!(p.penalty_duration_ms >= 300.0 && p.penalty_duration_ms <= 1000.0);
            prop_assert!(p.validate().is_ok());
        }
    }
}
