//! Deterministic game core
//!
//! All gameplay logic lives here. The core is pure and deterministic:
//! - Time comes from the host as a monotonic millisecond timestamp
//! - Every delayed or repeating action is a handle in a per-component timer arena
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod autopilot;
pub mod calibration;
pub mod collision;
pub mod formation;
pub mod player;
pub mod profile;
pub mod projectile;
pub mod round;
pub mod score;
pub mod session;
pub mod timer;
pub mod window;

pub use autopilot::Autopilot;
pub use calibration::{CalibrationController, CalibrationPress, ReactionSampler};
pub use collision::{Contact, Target, detect_contacts};
pub use formation::{Enemy, EnemyFormationController, EnemyId, StepOutcome};
pub use player::{LockoutCause, Movement, Player};
pub use profile::{DifficultyProfile, ProfileError, StoredProfileError};
pub use projectile::{Owner, Projectile, ProjectileId, Projectiles, Shield};
pub use round::{
    CoreError, FrameInput, FrameReport, GameEvent, Phase, PhaseTransition, Round,
    RoundOrchestrator, RoundOutcome, TriggerLatch,
};
pub use score::{EffectCommand, EffectKind, Score, ScoreEffectMachine, ScoreEvent, Tempo};
pub use session::{SessionAggregator, SessionResult};
pub use timer::{TimerArena, TimerHandle};
pub use window::{TimingWindowMachine, TriggerClass, WindowState};
