//! Round orchestration: Start -> Calibration -> Play -> GameOver
//!
//! The orchestrator owns every component and is driven by the host with a
//! monotonic timestamp once per frame. Within a frame the order is fixed:
//! timers (window, lockout, formation lock-step and return fire), then player
//! movement, then the trigger, then projectile flight and contacts. Phase
//! changes are returned to the host as values, never broadcast.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::calibration::{CalibrationController, CalibrationEvent, CalibrationPress};
use super::collision::{Contact, Target, detect_contacts};
use super::formation::{EnemyFormationController, EnemyId, FormationEvent, StepOutcome};
use super::player::{LockoutCause, Movement, Player};
use super::profile::{DifficultyProfile, ProfileError};
use super::projectile::{Projectiles, Shield};
use super::score::{EffectCommand, EffectKind, ScoreEffectMachine, ScoreEvent};
use super::session::{SessionAggregator, SessionResult};
use super::window::{TimingWindowMachine, TriggerClass, WindowEvent};
use crate::Millis;
use crate::history::PersistenceSink;

/// Top-level game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Start,
    Calibration,
    Play,
    GameOver,
}

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    /// The formation crossed the loss line
    Breached,
    /// Every enemy was destroyed
    Cleared,
}

/// A phase change, handed back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
}

/// Input sampled once per frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    /// Trigger button level; edges are derived internally
    pub trigger_held: bool,
    pub movement: Movement,
}

/// Turns a held level into one edge per physical press
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerLatch {
    held: bool,
}

impl TriggerLatch {
    /// True only on the frame the button goes down
    pub fn update(&mut self, held: bool) -> bool {
        let pressed = held && !self.held;
        self.held = held;
        pressed
    }
}

/// Everything the host may want to render or play a sound for
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    StimulusShown,
    StimulusHidden,
    CalibrationPress(CalibrationPress),
    CalibrationComplete(DifficultyProfile),
    WindowOpened,
    WindowClosed,
    Hit { latency_ms: Millis },
    Impulse,
    ShotFired { count: usize },
    LockoutImposed { cause: LockoutCause, duration_ms: Millis },
    LockoutEnded { cause: LockoutCause },
    FormationStepped(StepOutcome),
    EnemyFired,
    EnemyDestroyed { id: EnemyId },
    ScoreChanged { from: i8, to: i8, effect: EffectKind },
    ShieldAbsorbed { remaining: u8 },
    ShieldDown,
    PlayerHit,
    RoundOver { outcome: RoundOutcome, result: SessionResult },
    SessionPersisted,
    PersistFailed { reason: String },
}

/// Result of one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub events: Vec<GameEvent>,
    pub transition: Option<PhaseTransition>,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("clock went backwards: {now}ms after {last}ms")]
    ClockWentBackwards { last: Millis, now: Millis },
    #[error("cannot {action} during {phase:?}")]
    WrongPhase { action: &'static str, phase: Phase },
    #[error("no difficulty profile available")]
    NoProfile,
    #[error("rejected difficulty profile: {0}")]
    InvalidProfile(#[from] ProfileError),
}

/// State of one Play phase
#[derive(Debug, Clone)]
pub struct Round {
    profile: DifficultyProfile,
    window: TimingWindowMachine,
    score: ScoreEffectMachine,
    formation: EnemyFormationController,
    player: Player,
    projectiles: Projectiles,
    shield: Option<Shield>,
    twin_shot: bool,
    session: SessionAggregator,
    last_frame: Millis,
}

impl Round {
    fn new(now: Millis, profile: DifficultyProfile, seed: u64) -> Self {
        Self {
            profile,
            window: TimingWindowMachine::start(now, profile.window_ms()),
            score: ScoreEffectMachine::new(),
            formation: EnemyFormationController::new(now, profile.base_step_interval_ms(), seed),
            player: Player::new(),
            projectiles: Projectiles::new(),
            shield: None,
            twin_shot: false,
            session: SessionAggregator::new(),
            last_frame: now,
        }
    }

    pub fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    pub fn window(&self) -> &TimingWindowMachine {
        &self.window
    }

    pub fn score(&self) -> &ScoreEffectMachine {
        &self.score
    }

    pub fn formation(&self) -> &EnemyFormationController {
        &self.formation
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn projectiles(&self) -> &Projectiles {
        &self.projectiles
    }

    pub fn shield(&self) -> Option<&Shield> {
        self.shield.as_ref()
    }

    pub fn twin_shot(&self) -> bool {
        self.twin_shot
    }

    pub fn session(&self) -> &SessionAggregator {
        &self.session
    }

    fn frame(
        &mut self,
        now: Millis,
        pressed: bool,
        movement: Movement,
        events: &mut Vec<GameEvent>,
    ) -> Option<RoundOutcome> {
        for event in self.window.advance(now) {
            events.push(match event {
                WindowEvent::Opened { .. } => GameEvent::WindowOpened,
                WindowEvent::Closed { .. } => GameEvent::WindowClosed,
            });
        }

        if let Some(cause) = self.player.advance(now) {
            events.push(GameEvent::LockoutEnded { cause });
        }

        // Lock-step movement is settled before any shot this frame
        for event in self.formation.advance(now) {
            match event {
                FormationEvent::Stepped { outcome, .. } => {
                    events.push(GameEvent::FormationStepped(outcome));
                    if outcome == StepOutcome::Breached {
                        return Some(RoundOutcome::Breached);
                    }
                }
                FormationEvent::Fire { from, .. } => {
                    self.projectiles.fire_enemy(from);
                    events.push(GameEvent::EnemyFired);
                }
            }
        }

        let dt = now.saturating_sub(self.last_frame) as f32 / 1000.0;
        self.last_frame = now;
        self.player.steer(movement, dt);

        if pressed {
            self.trigger(now, events);
        }

        self.projectiles.integrate(dt);
        let contacts = detect_contacts(
            &self.projectiles,
            &self.formation,
            self.shield.as_ref(),
            self.player.pos(),
        );
        for contact in contacts {
            self.on_contact(now, contact, events);
        }

        self.formation.is_cleared().then_some(RoundOutcome::Cleared)
    }

    fn trigger(&mut self, now: Millis, events: &mut Vec<GameEvent>) {
        match self.window.classify(now) {
            TriggerClass::Hit { latency_ms } => {
                self.session.record_hit(latency_ms);
                events.push(GameEvent::Hit { latency_ms });
                let shots = self
                    .projectiles
                    .fire_player(self.player.muzzle(), self.twin_shot);
                events.push(GameEvent::ShotFired { count: shots.len() });
            }
            TriggerClass::Impulse => {
                self.session.record_misfire();
                events.push(GameEvent::Impulse);
                let penalty = self.profile.penalty_ms();
                self.player
                    .impose_lockout(now, penalty, LockoutCause::Penalty);
                events.push(GameEvent::LockoutImposed {
                    cause: LockoutCause::Penalty,
                    duration_ms: penalty,
                });
                self.apply_score(now, ScoreEvent::Misfire, events);
            }
        }
    }

    /// Handle one reported overlap. Duplicate or stale reports are ignored.
    fn on_contact(&mut self, now: Millis, contact: Contact, events: &mut Vec<GameEvent>) {
        if self.projectiles.get(contact.projectile).is_none() {
            return;
        }

        match contact.target {
            Target::Enemy(id) => {
                if !self.formation.destroy(id) {
                    return;
                }
                self.projectiles.take(contact.projectile);
                self.session.record_kill();
                events.push(GameEvent::EnemyDestroyed { id });
                self.apply_score(now, ScoreEvent::Kill, events);
            }
            Target::Shield => {
                let Some(shield) = self.shield.as_mut() else {
                    return;
                };
                self.projectiles.take(contact.projectile);
                let remaining = shield.absorb();
                events.push(GameEvent::ShieldAbsorbed { remaining });
                if remaining == 0 {
                    self.shield = None;
                    events.push(GameEvent::ShieldDown);
                }
            }
            Target::Player => {
                self.projectiles.take(contact.projectile);
                events.push(GameEvent::PlayerHit);
            }
        }
    }

    fn apply_score(&mut self, now: Millis, event: ScoreEvent, events: &mut Vec<GameEvent>) {
        let transition = self.score.apply(event);
        if transition.changed() {
            events.push(GameEvent::ScoreChanged {
                from: transition.from.value(),
                to: transition.to.value(),
                effect: transition.effect,
            });
        }
        for command in transition.commands {
            self.run_command(now, command, events);
        }
    }

    fn run_command(&mut self, now: Millis, command: EffectCommand, events: &mut Vec<GameEvent>) {
        match command {
            EffectCommand::AddSwarmRow => self.formation.add_swarm_row(),
            EffectCommand::RemoveSwarmRow => {
                self.formation.remove_swarm_row();
            }
            EffectCommand::EnsureSwarmRow => self.formation.ensure_swarm_row(),
            EffectCommand::Freeze { duration_ms } => {
                self.player
                    .impose_lockout(now, duration_ms, LockoutCause::Freeze);
                events.push(GameEvent::LockoutImposed {
                    cause: LockoutCause::Freeze,
                    duration_ms,
                });
            }
            EffectCommand::ReleaseFreeze => self.player.release_freeze(),
            EffectCommand::SetTempo(tempo) => self.formation.set_tempo(now, tempo),
            EffectCommand::SetTwinShot(on) => self.twin_shot = on,
            EffectCommand::SpawnShield { hit_points } => {
                self.shield = Some(Shield::new(hit_points));
            }
            EffectCommand::RestoreShield { hit_points } => match self.shield.as_mut() {
                Some(shield) => shield.hit_points = hit_points,
                None => self.shield = Some(Shield::new(hit_points)),
            },
            EffectCommand::RemoveShield => self.shield = None,
        }
    }

    /// Stop every timer and tear down active effects
    fn halt(&mut self, now: Millis) {
        for command in self.score.teardown() {
            self.run_command(now, command, &mut Vec::new());
        }
        self.formation.halt();
        self.projectiles.clear();
    }
}

/// Owns the phase machine and every component of the core
pub struct RoundOrchestrator<S: PersistenceSink> {
    phase: Phase,
    sink: S,
    rng: Pcg32,
    calibration: Option<CalibrationController>,
    round: Option<Round>,
    profile: Option<DifficultyProfile>,
    outcome: Option<RoundOutcome>,
    last_result: Option<SessionResult>,
    latch: TriggerLatch,
    last_now: Option<Millis>,
}

impl<S: PersistenceSink> RoundOrchestrator<S> {
    pub fn new(sink: S, seed: u64) -> Self {
        Self {
            phase: Phase::Start,
            sink,
            rng: Pcg32::seed_from_u64(seed),
            calibration: None,
            round: None,
            profile: None,
            outcome: None,
            last_result: None,
            latch: TriggerLatch::default(),
            last_now: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn profile(&self) -> Option<&DifficultyProfile> {
        self.profile.as_ref()
    }

    pub fn calibration(&self) -> Option<&CalibrationController> {
        self.calibration.as_ref()
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    pub fn last_result(&self) -> Option<&SessionResult> {
        self.last_result.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Start -> Calibration
    pub fn start(&mut self, now: Millis) -> Result<PhaseTransition, CoreError> {
        self.expect_phase(&[Phase::Start], "start calibration")?;
        self.check_clock(now)?;
        let seed = self.rng.random();
        self.calibration = Some(CalibrationController::start(now, seed));
        Ok(self.enter(Phase::Calibration))
    }

    /// Skip calibration with a profile supplied by the host
    pub fn play_with_profile(
        &mut self,
        now: Millis,
        profile: DifficultyProfile,
    ) -> Result<PhaseTransition, CoreError> {
        self.expect_phase(&[Phase::Start, Phase::GameOver], "play with a stored profile")?;
        self.check_clock(now)?;
        if let Err(e) = profile.validate() {
            log::warn!("Rejected stored profile: {}", e);
            return Err(e.into());
        }
        self.profile = Some(profile);
        Ok(self.begin_play(now))
    }

    /// GameOver -> Play with the same profile
    pub fn play_again(&mut self, now: Millis) -> Result<PhaseTransition, CoreError> {
        self.expect_phase(&[Phase::GameOver], "play again")?;
        self.check_clock(now)?;
        if self.profile.is_none() {
            return Err(CoreError::NoProfile);
        }
        Ok(self.begin_play(now))
    }

    /// GameOver -> Start
    pub fn main_menu(&mut self) -> Result<PhaseTransition, CoreError> {
        self.expect_phase(&[Phase::GameOver], "return to the main menu")?;
        self.round = None;
        Ok(self.enter(Phase::Start))
    }

    /// Advance one frame
    pub fn frame(&mut self, now: Millis, input: FrameInput) -> Result<FrameReport, CoreError> {
        self.check_clock(now)?;
        let pressed = self.latch.update(input.trigger_held);
        let mut report = FrameReport::default();

        match self.phase {
            Phase::Start | Phase::GameOver => {}
            Phase::Calibration => self.calibration_frame(now, pressed, &mut report),
            Phase::Play => {
                let outcome = match self.round.as_mut() {
                    Some(round) => round.frame(now, pressed, input.movement, &mut report.events),
                    None => None,
                };
                if let Some(outcome) = outcome {
                    report.transition = Some(self.conclude(now, outcome, &mut report.events));
                }
            }
        }

        Ok(report)
    }

    /// Deliver a contact from an external collision layer
    pub fn on_collision(&mut self, now: Millis, contact: Contact) -> Result<FrameReport, CoreError> {
        self.check_clock(now)?;
        let mut report = FrameReport::default();
        if self.phase != Phase::Play {
            return Ok(report);
        }
        let cleared = match self.round.as_mut() {
            Some(round) => {
                round.on_contact(now, contact, &mut report.events);
                round.formation.is_cleared()
            }
            None => false,
        };
        if cleared {
            report.transition = Some(self.conclude(now, RoundOutcome::Cleared, &mut report.events));
        }
        Ok(report)
    }

    fn calibration_frame(&mut self, now: Millis, pressed: bool, report: &mut FrameReport) {
        let Some(calibration) = self.calibration.as_mut() else {
            return;
        };

        let mut completed = None;
        for event in calibration.advance(now) {
            match event {
                CalibrationEvent::StimulusShown { .. } => report.events.push(GameEvent::StimulusShown),
                CalibrationEvent::StimulusHidden { .. } => {
                    report.events.push(GameEvent::StimulusHidden)
                }
                CalibrationEvent::Completed(profile) => {
                    report.events.push(GameEvent::CalibrationComplete(profile));
                    completed = Some(profile);
                }
            }
        }

        match completed {
            Some(profile) => {
                self.profile = Some(profile);
                self.calibration = None;
                report.transition = Some(self.begin_play(now));
            }
            None if pressed => {
                let press = calibration.press(now);
                report.events.push(GameEvent::CalibrationPress(press));
            }
            None => {}
        }
    }

    fn begin_play(&mut self, now: Millis) -> PhaseTransition {
        // Callers check the profile first
        let profile = self
            .profile
            .unwrap_or_else(|| DifficultyProfile::derive(crate::consts::DEFAULT_REACTION_MS, 0.0));
        let seed = self.rng.random();
        self.round = Some(Round::new(now, profile, seed));
        self.outcome = None;
        self.last_result = None;
        self.enter(Phase::Play)
    }

    fn conclude(
        &mut self,
        now: Millis,
        outcome: RoundOutcome,
        events: &mut Vec<GameEvent>,
    ) -> PhaseTransition {
        let result = match self.round.as_mut() {
            Some(round) => {
                round.halt(now);
                round.session.result()
            }
            None => SessionAggregator::new().result(),
        };

        log::info!("Round over ({:?}): {:?}", outcome, result);
        events.push(GameEvent::RoundOver { outcome, result });

        match self.sink.persist(&result) {
            Ok(()) => events.push(GameEvent::SessionPersisted),
            Err(e) => {
                log::warn!("Failed to persist session: {}", e);
                events.push(GameEvent::PersistFailed {
                    reason: e.to_string(),
                });
            }
        }

        self.outcome = Some(outcome);
        self.last_result = Some(result);
        self.enter(Phase::GameOver)
    }

    fn enter(&mut self, to: Phase) -> PhaseTransition {
        let transition = PhaseTransition {
            from: self.phase,
            to,
        };
        log::info!("Phase {:?} -> {:?}", transition.from, transition.to);
        self.phase = to;
        transition
    }

    fn expect_phase(&self, allowed: &[Phase], action: &'static str) -> Result<(), CoreError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(CoreError::WrongPhase {
                action,
                phase: self.phase,
            })
        }
    }

    /// A clock running backwards means the host is broken; abandon the phase
    fn check_clock(&mut self, now: Millis) -> Result<(), CoreError> {
        match self.last_now {
            Some(last) if now < last => {
                log::error!("Clock went backwards ({}ms -> {}ms), abandoning {:?}", last, now, self.phase);
                self.calibration = None;
                self.round = None;
                self.phase = Phase::Start;
                self.last_now = None;
                Err(CoreError::ClockWentBackwards { last, now })
            }
            _ => {
                self.last_now = Some(now);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::history::{MemorySink, PersistError};

    const FRAME_MS: Millis = 16;

    struct FailingSink;

    impl PersistenceSink for FailingSink {
        fn persist(&mut self, _result: &SessionResult) -> Result<(), PersistError> {
            Err(PersistError::Unavailable("backend offline".into()))
        }
    }

    fn profile() -> DifficultyProfile {
        DifficultyProfile::derive(330.0, 0.4)
    }

    fn playing(seed: u64) -> RoundOrchestrator<MemorySink> {
        let mut orch = RoundOrchestrator::new(MemorySink::new(), seed);
        orch.play_with_profile(0, profile()).unwrap();
        orch
    }

    fn round_mut<S: PersistenceSink>(orch: &mut RoundOrchestrator<S>) -> &mut Round {
        orch.round.as_mut().unwrap()
    }

    fn press() -> FrameInput {
        FrameInput {
            trigger_held: true,
            ..Default::default()
        }
    }

    /// Run idle frames until `until`, collecting every report
    fn idle_until<S: PersistenceSink>(
        orch: &mut RoundOrchestrator<S>,
        from: Millis,
        until: Millis,
    ) -> Vec<FrameReport> {
        (from..=until)
            .step_by(FRAME_MS as usize)
            .map(|now| orch.frame(now, FrameInput::default()).unwrap())
            .collect()
    }

    #[test]
    fn test_trigger_latch_fires_once_per_press() {
        let mut latch = TriggerLatch::default();
        assert!(latch.update(true));
        assert!(!latch.update(true));
        assert!(!latch.update(true));
        assert!(!latch.update(false));
        assert!(latch.update(true));
    }

    #[test]
    fn test_calibration_hands_profile_to_play() {
        let mut orch = RoundOrchestrator::new(MemorySink::new(), 11);
        let t = orch.start(0).unwrap();
        assert_eq!(t, PhaseTransition { from: Phase::Start, to: Phase::Calibration });

        let mut transition = None;
        let mut now = 0;
        while transition.is_none() {
            now += FRAME_MS;
            transition = orch.frame(now, FrameInput::default()).unwrap().transition;
            assert!(now < 30_000);
        }
        assert_eq!(
            transition,
            Some(PhaseTransition { from: Phase::Calibration, to: Phase::Play })
        );
        assert!(now >= CALIBRATION_MIN_DURATION_MS);
        let p = orch.profile().copied().unwrap();
        assert_eq!(p.average_reaction_time_ms, DEFAULT_REACTION_MS);
        assert_eq!(orch.round().unwrap().window().window_ms(), p.window_ms());
    }

    #[test]
    fn test_calibration_counts_presses() {
        let mut orch = RoundOrchestrator::new(MemorySink::new(), 5);
        orch.start(0).unwrap();
        // Early press straight away, then hold: no further presses registered
        let r = orch.frame(10, press()).unwrap();
        assert_eq!(r.events, vec![GameEvent::CalibrationPress(CalibrationPress::Early)]);
        assert!(orch.frame(20, press()).unwrap().events.is_empty());
        assert_eq!(orch.calibration().unwrap().sampler().early_presses(), 1);
    }

    #[test]
    fn test_impulse_costs_point_streak_and_one_lockout() {
        let mut orch = playing(3);
        let penalty = profile().penalty_ms();

        let r = orch.frame(100, press()).unwrap();
        assert!(r.events.contains(&GameEvent::Impulse));
        assert!(r.events.contains(&GameEvent::LockoutImposed {
            cause: LockoutCause::Penalty,
            duration_ms: penalty,
        }));

        let round = orch.round().unwrap();
        assert_eq!(round.score().score().value(), -1);
        assert_eq!(round.score().active_effect(), EffectKind::Haste);
        assert_eq!(round.window().clean_streak(), 0);
        assert_eq!(round.session().misfires(), 1);
        assert_eq!(round.player().lockout().map(|l| l.until), Some(100 + penalty));
        assert_eq!(round.player().lockouts_imposed(), 1);

        // Second impulse while still locked replaces the lockout instead of stacking
        orch.frame(150, FrameInput::default()).unwrap();
        orch.frame(200, press()).unwrap();
        let round = orch.round().unwrap();
        assert_eq!(round.player().pending_lockouts(), 1);
        // Penalty then Freeze were both imposed, each replacing the last
        assert_eq!(round.player().lockouts_imposed(), 3);
        // -1 -> -2 enters Frozen, whose lockout replaces the penalty
        assert_eq!(round.score().active_effect(), EffectKind::Frozen);
        assert_eq!(
            round.player().lockout().map(|l| (l.cause, l.until)),
            Some((LockoutCause::Freeze, 200 + FREEZE_LOCKOUT_MS))
        );
    }

    #[test]
    fn test_hit_fires_and_records_latency() {
        let mut orch = playing(3);
        idle_until(&mut orch, 0, WINDOW_PERIOD_MS);
        assert!(orch.round().unwrap().window().is_open());

        let now = WINDOW_PERIOD_MS + 120;
        let r = orch.frame(now, press()).unwrap();
        assert!(r.events.contains(&GameEvent::Hit { latency_ms: 120 }));
        assert!(r.events.contains(&GameEvent::ShotFired { count: 1 }));

        let round = orch.round().unwrap();
        assert_eq!(round.window().clean_streak(), 1);
        assert_eq!(round.session().hits(), 1);
        assert_eq!(round.score().score().value(), 0);
    }

    #[test]
    fn test_twin_shot_at_plus_two() {
        let mut orch = playing(3);
        {
            let round = round_mut(&mut orch);
            let mut events = Vec::new();
            round.apply_score(0, ScoreEvent::Kill, &mut events);
            round.apply_score(0, ScoreEvent::Kill, &mut events);
            assert!(round.twin_shot());
        }
        idle_until(&mut orch, 0, WINDOW_PERIOD_MS);
        let r = orch.frame(WINDOW_PERIOD_MS + 50, press()).unwrap();
        assert!(r.events.contains(&GameEvent::ShotFired { count: 2 }));
    }

    #[test]
    fn test_duplicate_collisions_kill_once() {
        let mut orch = playing(3);
        let (shot, enemy) = {
            let round = round_mut(&mut orch);
            let enemy = round.formation.enemies()[0].clone();
            let shot = round.projectiles.fire_player(enemy.pos, false)[0];
            (shot, enemy.id)
        };
        let contact = Contact {
            projectile: shot,
            target: Target::Enemy(enemy),
        };

        let first = orch.on_collision(10, contact).unwrap();
        assert!(first.events.contains(&GameEvent::EnemyDestroyed { id: enemy }));
        let second = orch.on_collision(10, contact).unwrap();
        assert!(second.events.is_empty());

        let round = orch.round().unwrap();
        assert_eq!(round.session().kills(), 1);
        assert_eq!(round.score().score().value(), 1);
        assert_eq!(round.formation().active_count(), 23);
    }

    #[test]
    fn test_shield_absorbs_enemy_fire() {
        let mut orch = playing(3);
        let shot = {
            let round = round_mut(&mut orch);
            let mut events = Vec::new();
            for _ in 0..3 {
                round.apply_score(0, ScoreEvent::Kill, &mut events);
            }
            assert_eq!(round.shield().map(|s| s.hit_points), Some(SHIELD_HIT_POINTS));
            // Saturating kills keep exactly one full shield
            round.shield.as_mut().unwrap().absorb();
            for _ in 0..5 {
                round.apply_score(0, ScoreEvent::Kill, &mut events);
            }
            assert_eq!(round.shield().map(|s| s.hit_points), Some(SHIELD_HIT_POINTS));
            round.projectiles.fire_enemy(glam::Vec2::new(512.0, SHIELD_Y))
        };

        let contact = Contact {
            projectile: shot,
            target: Target::Shield,
        };
        let r = orch.on_collision(5, contact).unwrap();
        assert_eq!(r.events, vec![GameEvent::ShieldAbsorbed { remaining: 4 }]);
        assert!(orch.on_collision(5, contact).unwrap().events.is_empty());
    }

    #[test]
    fn test_shield_removed_at_zero() {
        let mut orch = playing(3);
        let round = round_mut(&mut orch);
        let mut events = Vec::new();
        for _ in 0..3 {
            round.apply_score(0, ScoreEvent::Kill, &mut events);
        }
        let mut down = false;
        for _ in 0..SHIELD_HIT_POINTS {
            let shot = round.projectiles.fire_enemy(glam::Vec2::new(512.0, SHIELD_Y));
            let mut events = Vec::new();
            round.on_contact(0, Contact { projectile: shot, target: Target::Shield }, &mut events);
            down = events.contains(&GameEvent::ShieldDown);
        }
        assert!(down);
        assert!(round.shield().is_none());
    }

    #[test]
    fn test_swarm_row_follows_score() {
        let mut orch = playing(3);
        let round = round_mut(&mut orch);
        let mut events = Vec::new();
        for _ in 0..3 {
            round.apply_score(0, ScoreEvent::Misfire, &mut events);
        }
        assert_eq!(round.formation().active_count(), 32);
        // Saturated at -3: still one row
        round.apply_score(0, ScoreEvent::Misfire, &mut events);
        assert_eq!(round.formation().active_count(), 32);
        round.apply_score(0, ScoreEvent::Kill, &mut events);
        assert_eq!(round.formation().active_count(), 24);
    }

    #[test]
    fn test_breach_ends_round_exactly_once() {
        let mut orch = playing(9);
        let reports = idle_until(&mut orch, 0, 600_000);

        let transitions: Vec<PhaseTransition> =
            reports.iter().filter_map(|r| r.transition).collect();
        assert_eq!(
            transitions,
            vec![PhaseTransition { from: Phase::Play, to: Phase::GameOver }]
        );
        let round_overs = reports
            .iter()
            .flat_map(|r| &r.events)
            .filter(|e| matches!(e, GameEvent::RoundOver { .. }))
            .count();
        assert_eq!(round_overs, 1);

        assert_eq!(orch.phase(), Phase::GameOver);
        assert_eq!(orch.outcome(), Some(RoundOutcome::Breached));
        assert_eq!(
            orch.sink().results,
            vec![SessionResult {
                kill_count: 0,
                misfire_count: 0,
                final_score: 0,
                average_reaction_time_ms: None,
            }]
        );
    }

    #[test]
    fn test_clearing_formation_wins() {
        let mut orch = playing(3);
        let ids: Vec<EnemyId> = orch.round().unwrap().formation().live().map(|e| e.id).collect();
        let mut last = FrameReport::default();
        for id in ids {
            let shot = {
                let round = round_mut(&mut orch);
                let pos = round.formation.enemy(id).unwrap().pos;
                round.projectiles.fire_player(pos, false)[0]
            };
            last = orch
                .on_collision(1, Contact { projectile: shot, target: Target::Enemy(id) })
                .unwrap();
        }
        assert_eq!(
            last.transition,
            Some(PhaseTransition { from: Phase::Play, to: Phase::GameOver })
        );
        assert_eq!(orch.outcome(), Some(RoundOutcome::Cleared));
        let result = orch.last_result().copied().unwrap();
        assert_eq!(result.kill_count, 24);
        assert_eq!(result.final_score, 24);
    }

    #[test]
    fn test_kills_and_misfire_scenario() {
        let mut orch = playing(3);
        // One misfire before the first window
        orch.frame(50, press()).unwrap();
        orch.frame(60, FrameInput::default()).unwrap();

        for _ in 0..3 {
            let (shot, id) = {
                let round = round_mut(&mut orch);
                let enemy = round.formation.live().next().unwrap().clone();
                (round.projectiles.fire_player(enemy.pos, false)[0], enemy.id)
            };
            orch.on_collision(70, Contact { projectile: shot, target: Target::Enemy(id) })
                .unwrap();
        }

        let round = orch.round().unwrap();
        assert_eq!(round.score().score().value(), 2);
        assert_eq!(
            round.session().result(),
            SessionResult {
                kill_count: 3,
                misfire_count: 1,
                final_score: 2,
                average_reaction_time_ms: None,
            }
        );
    }

    #[test]
    fn test_persist_failure_is_not_fatal() {
        let mut orch = RoundOrchestrator::new(FailingSink, 4);
        orch.play_with_profile(0, profile()).unwrap();
        let reports = idle_until(&mut orch, 0, 600_000);
        let failed = reports
            .iter()
            .flat_map(|r| &r.events)
            .any(|e| matches!(e, GameEvent::PersistFailed { .. }));
        assert!(failed);
        assert_eq!(orch.phase(), Phase::GameOver);

        let t = orch.play_again(600_016).unwrap();
        assert_eq!(t, PhaseTransition { from: Phase::GameOver, to: Phase::Play });
        let t = {
            idle_until(&mut orch, 600_016, 1_200_000);
            orch.main_menu().unwrap()
        };
        assert_eq!(t, PhaseTransition { from: Phase::GameOver, to: Phase::Start });
    }

    #[test]
    fn test_menu_actions_check_phase() {
        let mut orch = RoundOrchestrator::new(MemorySink::new(), 1);
        assert!(matches!(orch.play_again(0), Err(CoreError::WrongPhase { .. })));
        assert!(matches!(orch.main_menu(), Err(CoreError::WrongPhase { .. })));

        let mut bad = profile();
        bad.penalty_duration_ms = 5000.0;
        assert!(matches!(
            orch.play_with_profile(0, bad),
            Err(CoreError::InvalidProfile(_))
        ));
        assert_eq!(orch.phase(), Phase::Start);
    }

    #[test]
    fn test_clock_going_backwards_abandons_phase() {
        let mut orch = playing(2);
        orch.frame(1000, FrameInput::default()).unwrap();
        assert!(matches!(
            orch.frame(900, FrameInput::default()),
            Err(CoreError::ClockWentBackwards { last: 1000, now: 900 })
        ));
        assert_eq!(orch.phase(), Phase::Start);
        assert!(orch.round().is_none());
        // The host can start over
        assert!(orch.start(900).is_ok());
    }

    #[test]
    fn test_same_seed_same_round() {
        let run = |seed| {
            let mut orch = playing(seed);
            idle_until(&mut orch, 0, 600_000);
            let round = orch.round().unwrap();
            (
                round.formation().enemies().to_vec(),
                round.projectiles().len(),
                orch.last_result().copied(),
            )
        };
        assert_eq!(run(77), run(77));
    }
}
