//! Scripted player for demos and the headless driver
//!
//! Reacts to stimuli and timing windows after a fixed delay and, with a
//! configurable chance per cycle, presses impulsively while the window is
//! closed. Between presses it tracks the lowest live enemy.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::player::Movement;
use super::round::{FrameInput, Phase, RoundOrchestrator};
use crate::Millis;
use crate::history::PersistenceSink;

/// Horizontal slack before the ship bothers to move
const TRACK_DEADZONE: f32 = 4.0;

#[derive(Debug, Clone)]
pub struct Autopilot {
    rng: Pcg32,
    reaction_delay_ms: Millis,
    impulse_chance: f64,
    pending_press: Option<Millis>,
    was_open: bool,
    held: bool,
}

impl Autopilot {
    pub fn new(seed: u64, reaction_delay_ms: Millis, impulse_chance: f64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            reaction_delay_ms,
            impulse_chance: impulse_chance.clamp(0.0, 1.0),
            pending_press: None,
            was_open: false,
            held: false,
        }
    }

    /// Decide this frame's input from what the core currently shows
    pub fn input<S: PersistenceSink>(
        &mut self,
        now: Millis,
        orch: &RoundOrchestrator<S>,
    ) -> FrameInput {
        let (open, movement) = match orch.phase() {
            Phase::Calibration => (
                orch.calibration().is_some_and(|c| c.is_stimulus_visible()),
                Movement::None,
            ),
            Phase::Play => match orch.round() {
                Some(round) => {
                    let target = round
                        .formation()
                        .live()
                        .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y).then(b.id.cmp(&a.id)))
                        .map(|e| e.pos.x);
                    let movement = match target {
                        Some(x) if x < round.player().x - TRACK_DEADZONE => Movement::Left,
                        Some(x) if x > round.player().x + TRACK_DEADZONE => Movement::Right,
                        _ => Movement::None,
                    };
                    (round.window().is_open(), movement)
                }
                None => (false, Movement::None),
            },
            Phase::Start | Phase::GameOver => {
                self.pending_press = None;
                self.was_open = false;
                self.held = false;
                return FrameInput::default();
            }
        };

        if open && !self.was_open {
            self.pending_press = Some(now + self.reaction_delay_ms);
        } else if !open && self.was_open && self.rng.random_bool(self.impulse_chance) {
            let delay = self.rng.random_range(100..1000);
            self.pending_press = Some(now + delay);
        }
        self.was_open = open;

        // Hold for a single frame so every press is a fresh edge
        self.held = match self.pending_press {
            Some(at) if now >= at && !self.held => {
                self.pending_press = None;
                true
            }
            _ => false,
        };

        FrameInput {
            trigger_held: self.held,
            movement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemorySink;
    use crate::sim::profile::DifficultyProfile;

    const FRAME_MS: Millis = 16;

    #[test]
    fn test_calibrates_with_configured_delay() {
        let mut orch = RoundOrchestrator::new(MemorySink::new(), 8);
        let mut pilot = Autopilot::new(8, 200, 0.0);
        orch.start(0).unwrap();

        let mut now = 0;
        while orch.phase() == Phase::Calibration {
            now += FRAME_MS;
            let input = pilot.input(now, &orch);
            orch.frame(now, input).unwrap();
            assert!(now < 60_000);
        }

        let profile = orch.profile().copied().unwrap();
        assert_eq!(profile.impulse_ratio, 0.0);
        assert!(profile.average_reaction_time_ms >= 200.0);
        assert!(profile.average_reaction_time_ms < 200.0 + 3.0 * FRAME_MS as f64);
    }

    #[test]
    fn test_patient_pilot_never_misfires() {
        let mut orch = RoundOrchestrator::new(MemorySink::new(), 21);
        let mut pilot = Autopilot::new(21, 150, 0.0);
        orch.play_with_profile(0, DifficultyProfile::derive(250.0, 0.0))
            .unwrap();

        let mut now = 0;
        while orch.phase() == Phase::Play {
            now += FRAME_MS;
            let input = pilot.input(now, &orch);
            orch.frame(now, input).unwrap();
            assert!(now < 1_200_000);
        }

        let result = orch.last_result().copied().unwrap();
        assert_eq!(result.misfire_count, 0);
        assert!(result.kill_count > 0);
        assert!(result.average_reaction_time_ms.is_some());
        assert_eq!(orch.sink().results, vec![result]);
    }

    #[test]
    fn test_impulsive_pilot_misfires() {
        let mut orch = RoundOrchestrator::new(MemorySink::new(), 2);
        let mut pilot = Autopilot::new(2, 150, 1.0);
        orch.play_with_profile(0, DifficultyProfile::derive(250.0, 0.5))
            .unwrap();

        for i in 1..=2000 {
            let now = i * FRAME_MS;
            let input = pilot.input(now, &orch);
            orch.frame(now, input).unwrap();
            if orch.phase() != Phase::Play {
                break;
            }
        }
        let misfires = match orch.round() {
            Some(round) => round.session().misfires(),
            None => 0,
        };
        assert!(misfires > 0);
    }

    #[test]
    fn test_idle_outside_gameplay() {
        let orch = RoundOrchestrator::new(MemorySink::new(), 1);
        let mut pilot = Autopilot::new(1, 100, 1.0);
        assert_eq!(pilot.input(0, &orch), FrameInput::default());
    }
}
