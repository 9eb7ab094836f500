//! Calibration: measure reaction time and impulsivity
//!
//! Stimuli flash at random intervals. Presses during a flash are reaction
//! samples; presses outside one are early (impulsive) presses. Once enough
//! stimuli have been shown and enough time has passed, the measurements are
//! turned into a [`DifficultyProfile`].

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::profile::DifficultyProfile;
use super::timer::TimerArena;
use crate::Millis;
use crate::consts::*;

/// One valid stimulus response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionSample {
    /// When the press landed
    pub captured_at_ms: Millis,
    /// Time from stimulus onset to the press
    pub reaction_ms: Millis,
}

/// Collects samples and press counts over one calibration run
#[derive(Debug, Clone, Default)]
pub struct ReactionSampler {
    samples: Vec<ReactionSample>,
    early_presses: u32,
    stimuli_shown: u32,
}

impl ReactionSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&mut self, captured_at_ms: Millis, reaction_ms: Millis) {
        self.samples.push(ReactionSample {
            captured_at_ms,
            reaction_ms,
        });
    }

    pub fn record_early_press(&mut self) {
        self.early_presses += 1;
    }

    pub fn record_stimulus(&mut self) {
        self.stimuli_shown += 1;
    }

    pub fn samples(&self) -> &[ReactionSample] {
        &self.samples
    }

    pub fn early_presses(&self) -> u32 {
        self.early_presses
    }

    pub fn stimuli_shown(&self) -> u32 {
        self.stimuli_shown
    }

    /// Mean reaction time, or the default when nothing was recorded
    pub fn average_reaction_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return DEFAULT_REACTION_MS;
        }
        let total: f64 = self.samples.iter().map(|s| s.reaction_ms as f64).sum();
        total / self.samples.len() as f64
    }

    /// Early presses per stimulus shown. Can exceed 1.0 for a player who
    /// presses more often than stimuli appear.
    pub fn impulse_ratio(&self) -> f64 {
        self.early_presses as f64 / self.stimuli_shown.max(1) as f64
    }

    pub fn profile(&self) -> DifficultyProfile {
        DifficultyProfile::derive(self.average_reaction_ms(), self.impulse_ratio())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalibrationTimer {
    NextStimulus,
    HideStimulus,
    CompletionCheck,
}

/// What a trigger press during calibration counted as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPress {
    Reaction { reaction_ms: Millis },
    Early,
}

/// Visible calibration changes reported to the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationEvent {
    StimulusShown { at: Millis },
    StimulusHidden { at: Millis },
    Completed(DifficultyProfile),
}

/// Drives the stimulus loop and produces a [`DifficultyProfile`]
#[derive(Debug, Clone)]
pub struct CalibrationController {
    timers: TimerArena<CalibrationTimer>,
    sampler: ReactionSampler,
    rng: Pcg32,
    started_at: Millis,
    /// Onset of the stimulus currently on screen
    visible_since: Option<Millis>,
    result: Option<DifficultyProfile>,
}

impl CalibrationController {
    /// Begin a calibration run at `now`
    pub fn start(now: Millis, seed: u64) -> Self {
        let mut controller = Self {
            timers: TimerArena::new(),
            sampler: ReactionSampler::new(),
            rng: Pcg32::seed_from_u64(seed),
            started_at: now,
            visible_since: None,
            result: None,
        };
        controller.schedule_next_stimulus(now);
        controller
            .timers
            .every(now, CALIBRATION_CHECK_MS, CalibrationTimer::CompletionCheck);
        log::debug!("Calibration started at {}ms", now);
        controller
    }

    /// Run every timer due by `now`
    pub fn advance(&mut self, now: Millis) -> Vec<CalibrationEvent> {
        let mut events = Vec::new();
        if self.result.is_some() {
            return events;
        }

        while let Some(fired) = self.timers.pop_due(now) {
            match fired.kind {
                CalibrationTimer::NextStimulus => {
                    self.visible_since = Some(fired.at);
                    self.sampler.record_stimulus();
                    self.timers
                        .after(fired.at, STIMULUS_VISIBLE_MS, CalibrationTimer::HideStimulus);
                    self.schedule_next_stimulus(fired.at);
                    events.push(CalibrationEvent::StimulusShown { at: fired.at });
                }
                CalibrationTimer::HideStimulus => {
                    self.visible_since = None;
                    events.push(CalibrationEvent::StimulusHidden { at: fired.at });
                }
                CalibrationTimer::CompletionCheck => {
                    if self.can_finish(fired.at) {
                        let profile = self.finish();
                        events.push(CalibrationEvent::Completed(profile));
                        break;
                    }
                }
            }
        }

        events
    }

    /// Register a trigger press at `now`
    pub fn press(&mut self, now: Millis) -> CalibrationPress {
        match self.visible_since {
            Some(shown_at) => {
                let reaction_ms = now.saturating_sub(shown_at);
                self.sampler.record_sample(now, reaction_ms);
                CalibrationPress::Reaction { reaction_ms }
            }
            None => {
                self.sampler.record_early_press();
                CalibrationPress::Early
            }
        }
    }

    pub fn is_stimulus_visible(&self) -> bool {
        self.visible_since.is_some()
    }

    pub fn result(&self) -> Option<DifficultyProfile> {
        self.result
    }

    pub fn sampler(&self) -> &ReactionSampler {
        &self.sampler
    }

    pub fn elapsed(&self, now: Millis) -> Millis {
        now.saturating_sub(self.started_at)
    }

    fn can_finish(&self, at: Millis) -> bool {
        self.sampler.stimuli_shown() >= CALIBRATION_MIN_STIMULI
            && self.elapsed(at) >= CALIBRATION_MIN_DURATION_MS
            && self.visible_since.is_none()
    }

    fn finish(&mut self) -> DifficultyProfile {
        self.timers.clear();
        let profile = self.sampler.profile();
        log::info!(
            "Calibration complete: {} samples, {} early presses over {} stimuli -> {:?}",
            self.sampler.samples().len(),
            self.sampler.early_presses(),
            self.sampler.stimuli_shown(),
            profile
        );
        self.result = Some(profile);
        profile
    }

    fn schedule_next_stimulus(&mut self, from: Millis) {
        let delay = self
            .rng
            .random_range(STIMULUS_DELAY_MIN_MS..STIMULUS_DELAY_MAX_MS);
        self.timers.after(from, delay, CalibrationTimer::NextStimulus);
    }
}
