//! Bounded round score and the gameplay effect bound to each score value
//!
//! The score moves one step per kill or misfire and saturates at ±3. Each
//! value maps to exactly one effect. The machine does not touch the formation
//! or the player itself: a transition produces [`EffectCommand`]s (exit
//! handler of the old effect first, then enter handler of the new one) that
//! the round applies to the components that own the affected state.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Round score, always within [`SCORE_MIN`, `SCORE_MAX`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Score(i8);

impl Score {
    pub const MIN: Score = Score(SCORE_MIN);
    pub const MAX: Score = Score(SCORE_MAX);

    /// Build a score, saturating into range
    pub fn new(value: i32) -> Self {
        Score(value.clamp(SCORE_MIN as i32, SCORE_MAX as i32) as i8)
    }

    pub fn value(self) -> i8 {
        self.0
    }

    pub fn step(self, delta: i32) -> Self {
        Score::new(self.0 as i32 + delta)
    }
}

/// Gameplay modifier bound to a score value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// -3: one extra enemy row
    Swarm,
    /// -2: immediate movement lockout
    Frozen,
    /// -1: faster formation
    Haste,
    /// 0
    Neutral,
    /// +1: slower formation
    Calm,
    /// +2: paired shots
    TwinShot,
    /// +3: barrier between player and formation
    Shield,
}

impl EffectKind {
    pub fn for_score(score: Score) -> Self {
        match score.value() {
            i8::MIN..=-3 => EffectKind::Swarm,
            -2 => EffectKind::Frozen,
            -1 => EffectKind::Haste,
            0 => EffectKind::Neutral,
            1 => EffectKind::Calm,
            2 => EffectKind::TwinShot,
            3..=i8::MAX => EffectKind::Shield,
        }
    }

    /// Commands that install this effect
    fn enter(self) -> Vec<EffectCommand> {
        match self {
            EffectKind::Swarm => vec![EffectCommand::AddSwarmRow],
            EffectKind::Frozen => vec![EffectCommand::Freeze {
                duration_ms: FREEZE_LOCKOUT_MS,
            }],
            EffectKind::Haste => vec![EffectCommand::SetTempo(Tempo::Haste)],
            EffectKind::Neutral => Vec::new(),
            EffectKind::Calm => vec![EffectCommand::SetTempo(Tempo::Calm)],
            EffectKind::TwinShot => vec![EffectCommand::SetTwinShot(true)],
            EffectKind::Shield => vec![EffectCommand::SpawnShield {
                hit_points: SHIELD_HIT_POINTS,
            }],
        }
    }

    /// Commands that remove every trace of this effect
    fn exit(self) -> Vec<EffectCommand> {
        match self {
            EffectKind::Swarm => vec![EffectCommand::RemoveSwarmRow],
            EffectKind::Frozen => vec![EffectCommand::ReleaseFreeze],
            EffectKind::Haste | EffectKind::Calm => vec![EffectCommand::SetTempo(Tempo::Normal)],
            EffectKind::Neutral => Vec::new(),
            EffectKind::TwinShot => vec![EffectCommand::SetTwinShot(false)],
            EffectKind::Shield => vec![EffectCommand::RemoveShield],
        }
    }

    /// Commands for an event that pushed against the bound this effect sits on
    fn refresh(self) -> Vec<EffectCommand> {
        match self {
            EffectKind::Swarm => vec![EffectCommand::EnsureSwarmRow],
            EffectKind::Shield => vec![EffectCommand::RestoreShield {
                hit_points: SHIELD_HIT_POINTS,
            }],
            _ => Vec::new(),
        }
    }
}

/// Formation lock-step tempo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tempo {
    Normal,
    Haste,
    Calm,
}

impl Tempo {
    /// Lock-step interval for this tempo given the profile's baseline
    pub fn interval_ms(self, baseline_ms: f64) -> crate::Millis {
        let interval = match self {
            Tempo::Normal => baseline_ms,
            Tempo::Haste => (baseline_ms * HASTE_FACTOR).max(HASTE_FLOOR_MS as f64),
            Tempo::Calm => baseline_ms * CALM_FACTOR,
        };
        interval.round().max(1.0) as crate::Millis
    }
}

/// A side effect the round must apply after a score transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectCommand {
    AddSwarmRow,
    RemoveSwarmRow,
    /// Re-add the swarm row only if none of its members are alive
    EnsureSwarmRow,
    Freeze { duration_ms: crate::Millis },
    /// Lift a lockout imposed by `Freeze`; penalty lockouts are untouched
    ReleaseFreeze,
    SetTempo(Tempo),
    SetTwinShot(bool),
    SpawnShield { hit_points: u8 },
    /// Top the single shield back up, creating it if it was destroyed
    RestoreShield { hit_points: u8 },
    RemoveShield,
}

/// What moved the score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreEvent {
    Kill,
    Misfire,
}

impl ScoreEvent {
    fn delta(self) -> i32 {
        match self {
            ScoreEvent::Kill => 1,
            ScoreEvent::Misfire => -1,
        }
    }
}

/// Result of feeding one event into the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreTransition {
    pub from: Score,
    pub to: Score,
    pub effect: EffectKind,
    pub commands: Vec<EffectCommand>,
}

impl ScoreTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone)]
pub struct ScoreEffectMachine {
    score: Score,
    active: EffectKind,
}

impl Default for ScoreEffectMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreEffectMachine {
    /// Start at 0 / Neutral
    pub fn new() -> Self {
        Self {
            score: Score::default(),
            active: EffectKind::Neutral,
        }
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn active_effect(&self) -> EffectKind {
        self.active
    }

    pub fn apply(&mut self, event: ScoreEvent) -> ScoreTransition {
        let from = self.score;
        let to = from.step(event.delta());

        if to == from {
            // Saturated: no teardown, no re-entry
            return ScoreTransition {
                from,
                to,
                effect: self.active,
                commands: self.active.refresh(),
            };
        }

        let next = EffectKind::for_score(to);
        let mut commands = self.active.exit();
        commands.extend(next.enter());

        log::debug!(
            "Score {} -> {} ({:?} -> {:?})",
            from.value(),
            to.value(),
            self.active,
            next
        );

        self.score = to;
        self.active = next;

        ScoreTransition {
            from,
            to,
            effect: next,
            commands,
        }
    }

    /// Commands that tear down whatever is active, used when a round ends
    pub fn teardown(&mut self) -> Vec<EffectCommand> {
        let commands = self.active.exit();
        self.score = Score::default();
        self.active = EffectKind::Neutral;
        commands
    }
}
