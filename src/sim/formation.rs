//! Enemy formation: lock-step march, descent and return fire
//!
//! The whole grid moves as one rigid body. On each lock-step tick the grid
//! either shifts sideways or, if any live enemy would cross a horizontal
//! bound, drops one row and reverses. A live enemy below the loss line ends
//! the round; destroying every enemy clears it.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::score::Tempo;
use super::timer::{TimerArena, TimerHandle};
use crate::Millis;
use crate::consts::*;

pub type EnemyId = u32;

/// Row index given to the swarm row, above row 0
pub const SWARM_ROW: i32 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EnemyId,
    pub pos: Vec2,
    pub alive: bool,
    pub row: i32,
    /// Spawned by the Swarm effect; removed when it ends
    pub swarm: bool,
}

/// Result of one lock-step tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Shifted,
    /// Dropped a row and reversed direction
    Dropped,
    /// A live enemy crossed the loss line
    Breached,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormationEvent {
    Stepped { at: Millis, outcome: StepOutcome },
    /// A live enemy fires from `from`
    Fire { at: Millis, from: Vec2 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormationTimer {
    Step,
    Fire,
}

#[derive(Debug, Clone)]
pub struct EnemyFormationController {
    enemies: Vec<Enemy>,
    /// +1 right, -1 left
    direction: f32,
    /// Total displacement since spawn, used to place the swarm row
    offset: Vec2,
    timers: TimerArena<FormationTimer>,
    step_handle: Option<TimerHandle>,
    /// Deadline of the most recent lock-step (or the march start)
    last_step_at: Millis,
    baseline_ms: f64,
    tempo: Tempo,
    rng: Pcg32,
    next_id: EnemyId,
    breached: bool,
}

impl EnemyFormationController {
    /// Spawn the standard grid and start marching at `now`
    pub fn new(now: Millis, baseline_ms: f64, seed: u64) -> Self {
        let mut formation = Self {
            enemies: Vec::with_capacity((FORMATION_ROWS * FORMATION_COLS) as usize),
            direction: 1.0,
            offset: Vec2::ZERO,
            timers: TimerArena::new(),
            step_handle: None,
            last_step_at: now,
            baseline_ms,
            tempo: Tempo::Normal,
            rng: Pcg32::seed_from_u64(seed),
            next_id: 1,
            breached: false,
        };

        for row in 0..FORMATION_ROWS as i32 {
            formation.spawn_row(row, false);
        }

        let interval = formation.tempo.interval_ms(baseline_ms);
        formation.step_handle = Some(formation.timers.every(now, interval, FormationTimer::Step));
        formation.schedule_fire(now);
        formation
    }

    pub fn advance(&mut self, now: Millis) -> Vec<FormationEvent> {
        let mut events = Vec::new();
        while let Some(fired) = self.timers.pop_due(now) {
            match fired.kind {
                FormationTimer::Step => {
                    self.last_step_at = fired.at;
                    let outcome = self.step();
                    events.push(FormationEvent::Stepped {
                        at: fired.at,
                        outcome,
                    });
                    if outcome == StepOutcome::Breached {
                        // The round is over; nothing else may move
                        self.timers.clear();
                        self.step_handle = None;
                        break;
                    }
                }
                FormationTimer::Fire => {
                    if let Some(from) = self.pick_shooter() {
                        events.push(FormationEvent::Fire { at: fired.at, from });
                    }
                    self.schedule_fire(fired.at);
                }
            }
        }
        events
    }

    /// Move the formation one lock-step
    pub fn step(&mut self) -> StepOutcome {
        if self.breached {
            return StepOutcome::Breached;
        }

        let dx = self.direction * FORMATION_STEP_X;
        let would_cross = self.live().any(|e| {
            let next_x = e.pos.x + dx;
            !(FORMATION_LEFT_BOUND..=FORMATION_RIGHT_BOUND).contains(&next_x)
        });

        let delta = if would_cross {
            self.direction = -self.direction;
            Vec2::new(0.0, FORMATION_DROP_Y)
        } else {
            Vec2::new(dx, 0.0)
        };

        // Dead enemies ride along so the grid geometry stays intact
        for enemy in &mut self.enemies {
            enemy.pos += delta;
        }
        self.offset += delta;

        if self.live().any(|e| e.pos.y > FORMATION_LOSS_Y) {
            self.breached = true;
            log::info!("Formation breached the loss line");
            return StepOutcome::Breached;
        }

        if would_cross {
            log::debug!("Formation dropped to offset {:?}", self.offset);
            StepOutcome::Dropped
        } else {
            StepOutcome::Shifted
        }
    }

    /// Change lock-step tempo. The next step is due one new interval after
    /// the last one, or immediately if that moment has already passed.
    pub fn set_tempo(&mut self, now: Millis, tempo: Tempo) {
        if tempo == self.tempo {
            return;
        }
        self.tempo = tempo;
        if self.breached {
            return;
        }
        if let Some(old) = self.step_handle.take() {
            self.timers.cancel(old);
        }
        let interval = tempo.interval_ms(self.baseline_ms);
        let next = (self.last_step_at + interval).max(now);
        self.step_handle = Some(self.timers.every_at(next, interval, FormationTimer::Step));
        log::debug!("Formation tempo {:?} ({}ms, next step at {}ms)", tempo, interval, next);
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn step_interval_ms(&self) -> Millis {
        self.tempo.interval_ms(self.baseline_ms)
    }

    /// Mark an enemy destroyed. Returns false if it was already dead or unknown.
    pub fn destroy(&mut self, id: EnemyId) -> bool {
        match self.enemies.iter_mut().find(|e| e.id == id) {
            Some(enemy) if enemy.alive => {
                enemy.alive = false;
                true
            }
            _ => false,
        }
    }

    /// Add the swarm row one row spacing above the grid
    pub fn add_swarm_row(&mut self) {
        self.spawn_row(SWARM_ROW, true);
        log::debug!("Swarm row added");
    }

    /// Remove the swarm row; returns how many live members went with it
    pub fn remove_swarm_row(&mut self) -> usize {
        let removed = self.enemies.iter().filter(|e| e.swarm && e.alive).count();
        self.enemies.retain(|e| !e.swarm);
        removed
    }

    /// Re-add the swarm row only if none of its members are alive
    pub fn ensure_swarm_row(&mut self) {
        if !self.enemies.iter().any(|e| e.swarm && e.alive) {
            self.enemies.retain(|e| !e.swarm);
            self.add_swarm_row();
        }
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn enemy(&self, id: EnemyId) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }

    pub fn live(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.iter().filter(|e| e.alive)
    }

    pub fn active_count(&self) -> usize {
        self.live().count()
    }

    pub fn is_cleared(&self) -> bool {
        self.active_count() == 0
    }

    pub fn is_breached(&self) -> bool {
        self.breached
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }

    /// Stop marching and firing
    pub fn halt(&mut self) {
        self.timers.clear();
        self.step_handle = None;
    }

    fn spawn_row(&mut self, row: i32, swarm: bool) {
        let y = FORMATION_START_Y + row as f32 * FORMATION_SPACING_Y + self.offset.y;
        let left = FORMATION_START_X + self.offset.x;
        let right = left + (FORMATION_COLS - 1) as f32 * FORMATION_SPACING_X;
        // Once edge columns die the grid can march past its full-width limits;
        // pull the new row back inside the bounds
        let shift = if right > FORMATION_RIGHT_BOUND {
            FORMATION_RIGHT_BOUND - right
        } else if left < FORMATION_LEFT_BOUND {
            FORMATION_LEFT_BOUND - left
        } else {
            0.0
        };

        for col in 0..FORMATION_COLS {
            let x = left + shift + col as f32 * FORMATION_SPACING_X;
            let id = self.next_id;
            self.next_id += 1;
            self.enemies.push(Enemy {
                id,
                pos: Vec2::new(x, y),
                alive: true,
                row,
                swarm,
            });
        }
    }

    fn pick_shooter(&mut self) -> Option<Vec2> {
        let count = self.active_count();
        if count == 0 {
            return None;
        }
        let pick = self.rng.random_range(0..count);
        self.live()
            .nth(pick)
            .map(|e| e.pos + Vec2::new(0.0, ENEMY_HALF_EXTENT))
    }

    fn schedule_fire(&mut self, from: Millis) {
        let delay = self.rng.random_range(ENEMY_FIRE_MIN_MS..ENEMY_FIRE_MAX_MS);
        self.timers.after(from, delay, FormationTimer::Fire);
    }
}
