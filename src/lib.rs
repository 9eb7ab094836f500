//! Brain Invaders - an adaptive impulse-control training game
//!
//! Players hold fire except during short, unpredictable "go" windows while a
//! Space Invaders formation marches down the screen. Difficulty is tuned to
//! each player's measured reaction profile.
//!
//! Core modules:
//! - `sim`: Deterministic game core (calibration, timing window, score effects,
//!   enemy formation, round orchestration)
//! - `history`: Session result persistence and personal bests
//! - `settings`: Headless driver configuration

pub mod history;
pub mod settings;
pub mod sim;

pub use history::{JsonFileSink, MemorySink, PersistError, PersistenceSink, SessionHistory};
pub use settings::Settings;

/// Milliseconds on the host's monotonic clock
pub type Millis = u64;

/// Game configuration constants
pub mod consts {
    use super::Millis;

    /// Play area dimensions
    pub const PLAY_WIDTH: f32 = 1024.0;
    pub const PLAY_HEIGHT: f32 = 768.0;

    // === Calibration ===
    /// Stimulus spacing is uniform in [MIN, MAX)
    pub const STIMULUS_DELAY_MIN_MS: Millis = 1300;
    pub const STIMULUS_DELAY_MAX_MS: Millis = 1800;
    /// How long each stimulus stays visible
    pub const STIMULUS_VISIBLE_MS: Millis = 300;
    /// Completion condition is polled on this period
    pub const CALIBRATION_CHECK_MS: Millis = 200;
    pub const CALIBRATION_MIN_STIMULI: u32 = 3;
    pub const CALIBRATION_MIN_DURATION_MS: Millis = 7500;
    /// Used when the player never produced a valid response
    pub const DEFAULT_REACTION_MS: f64 = 300.0;

    // === Difficulty profile bounds ===
    pub const WINDOW_SIZE_RANGE_MS: (f64, f64) = (200.0, 800.0);
    pub const ENEMY_SPEED_RANGE: (f64, f64) = (0.8, 2.5);
    pub const PENALTY_RANGE_MS: (f64, f64) = (300.0, 1000.0);

    // === Timing window ===
    pub const WINDOW_PERIOD_MS: Millis = 2000;

    // === Score effects ===
    pub const SCORE_MIN: i8 = -3;
    pub const SCORE_MAX: i8 = 3;
    pub const FREEZE_LOCKOUT_MS: Millis = 2000;
    pub const HASTE_FACTOR: f64 = 0.6;
    pub const HASTE_FLOOR_MS: Millis = 200;
    pub const CALM_FACTOR: f64 = 1.4;
    pub const SHIELD_HIT_POINTS: u8 = 5;
    pub const TWIN_SHOT_OFFSET: f32 = 15.0;

    // === Enemy formation ===
    pub const FORMATION_ROWS: u32 = 3;
    pub const FORMATION_COLS: u32 = 8;
    pub const FORMATION_START_X: f32 = 150.0;
    pub const FORMATION_START_Y: f32 = 100.0;
    pub const FORMATION_SPACING_X: f32 = 80.0;
    pub const FORMATION_SPACING_Y: f32 = 60.0;
    /// Horizontal bounds an enemy centre may not cross
    pub const FORMATION_LEFT_BOUND: f32 = 50.0;
    pub const FORMATION_RIGHT_BOUND: f32 = 950.0;
    pub const FORMATION_STEP_X: f32 = 20.0;
    pub const FORMATION_DROP_Y: f32 = 20.0;
    /// Any live enemy below this line ends the round
    pub const FORMATION_LOSS_Y: f32 = 500.0;
    /// Lock-step interval at enemy speed factor 1.0
    pub const BASE_STEP_INTERVAL_MS: f64 = 1000.0;
    pub const ENEMY_HALF_EXTENT: f32 = 16.0;

    // === Enemy fire ===
    pub const ENEMY_FIRE_MIN_MS: Millis = 800;
    pub const ENEMY_FIRE_MAX_MS: Millis = 1500;

    // === Player ===
    pub const PLAYER_Y: f32 = 550.0;
    pub const PLAYER_START_X: f32 = 512.0;
    pub const PLAYER_MIN_X: f32 = 32.0;
    pub const PLAYER_MAX_X: f32 = 992.0;
    /// Horizontal speed (pixels/s)
    pub const PLAYER_SPEED: f32 = 300.0;
    pub const PLAYER_HALF_EXTENT: f32 = 20.0;

    // === Projectiles ===
    pub const PLAYER_SHOT_SPEED: f32 = 500.0;
    pub const ENEMY_SHOT_SPEED: f32 = 300.0;
    pub const SHOT_HALF_WIDTH: f32 = 3.0;
    pub const SHOT_HALF_HEIGHT: f32 = 8.0;
    /// Muzzle sits this far above the ship centre
    pub const MUZZLE_OFFSET: f32 = 20.0;

    // === Shield ===
    pub const SHIELD_Y: f32 = 490.0;
    pub const SHIELD_HALF_WIDTH: f32 = 60.0;
    pub const SHIELD_HALF_HEIGHT: f32 = 8.0;
}

/// Clamp a value into an inclusive `(min, max)` range
#[inline]
pub fn clamp_range(value: f64, range: (f64, f64)) -> f64 {
    value.clamp(range.0, range.1)
}
