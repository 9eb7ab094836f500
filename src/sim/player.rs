//! Player ship and movement lockouts
//!
//! A lockout freezes horizontal movement. Only one lockout is ever pending:
//! imposing a new one cancels and replaces the old timer.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::timer::{TimerArena, TimerHandle};
use crate::Millis;
use crate::consts::*;

/// Horizontal input state for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Movement {
    Left,
    Right,
    #[default]
    None,
}

impl Movement {
    fn sign(self) -> f32 {
        match self {
            Movement::Left => -1.0,
            Movement::Right => 1.0,
            Movement::None => 0.0,
        }
    }
}

/// Why the player is locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockoutCause {
    /// Impulsive trigger press
    Penalty,
    /// Frozen score effect
    Freeze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lockout {
    pub cause: LockoutCause,
    pub until: Millis,
    handle: TimerHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockoutExpired;

#[derive(Debug, Clone)]
pub struct Player {
    pub x: f32,
    lockout: Option<Lockout>,
    timers: TimerArena<LockoutExpired>,
    lockouts_imposed: u32,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            x: PLAYER_START_X,
            lockout: None,
            timers: TimerArena::new(),
            lockouts_imposed: 0,
        }
    }

    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, PLAYER_Y)
    }

    /// Where shots leave the ship
    pub fn muzzle(&self) -> Vec2 {
        Vec2::new(self.x, PLAYER_Y - MUZZLE_OFFSET)
    }

    /// Expire lockouts due by `now`. Returns the cause of an expired lockout.
    pub fn advance(&mut self, now: Millis) -> Option<LockoutCause> {
        let mut expired = None;
        while let Some(fired) = self.timers.pop_due(now) {
            if let Some(lockout) = self.lockout.filter(|l| l.handle == fired.handle) {
                expired = Some(lockout.cause);
                self.lockout = None;
            }
        }
        expired
    }

    /// Move for `dt` seconds unless locked
    pub fn steer(&mut self, movement: Movement, dt: f32) {
        if self.is_locked() {
            return;
        }
        self.x = (self.x + movement.sign() * PLAYER_SPEED * dt).clamp(PLAYER_MIN_X, PLAYER_MAX_X);
    }

    /// Lock movement for `duration` ms from `now`, replacing any pending lockout
    pub fn impose_lockout(&mut self, now: Millis, duration: Millis, cause: LockoutCause) {
        let mut current = self.lockout.take().map(|l| l.handle);
        let handle = self.timers.replace(&mut current, now, duration, LockoutExpired);
        self.lockout = Some(Lockout {
            cause,
            until: now + duration,
            handle,
        });
        self.lockouts_imposed += 1;
        log::debug!("Lockout {:?} for {}ms", cause, duration);
    }

    /// Lift the lockout if a freeze imposed it
    pub fn release_freeze(&mut self) {
        if let Some(lockout) = self.lockout.filter(|l| l.cause == LockoutCause::Freeze) {
            self.timers.cancel(lockout.handle);
            self.lockout = None;
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lockout.is_some()
    }

    pub fn lockout(&self) -> Option<Lockout> {
        self.lockout
    }

    /// Total lockouts imposed this round (replacements included)
    pub fn lockouts_imposed(&self) -> u32 {
        self.lockouts_imposed
    }

    /// Pending lockout timers; never more than one
    pub fn pending_lockouts(&self) -> usize {
        self.timers.pending_count()
    }
}
