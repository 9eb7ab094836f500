//! Projectiles in flight and the shield barrier

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

pub type ProjectileId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    Player,
    Enemy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: ProjectileId,
    pub owner: Owner,
    pub pos: Vec2,
    pub vel: Vec2,
}

/// Every projectile currently in flight
#[derive(Debug, Clone)]
pub struct Projectiles {
    items: Vec<Projectile>,
    next_id: ProjectileId,
}

impl Default for Projectiles {
    fn default() -> Self {
        Self::new()
    }
}

impl Projectiles {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }

    /// Fire from the player's muzzle; twin shot spawns a symmetric pair
    pub fn fire_player(&mut self, muzzle: Vec2, twin: bool) -> Vec<ProjectileId> {
        let vel = Vec2::new(0.0, -PLAYER_SHOT_SPEED);
        if twin {
            vec![
                self.spawn(Owner::Player, muzzle - Vec2::new(TWIN_SHOT_OFFSET, 0.0), vel),
                self.spawn(Owner::Player, muzzle + Vec2::new(TWIN_SHOT_OFFSET, 0.0), vel),
            ]
        } else {
            vec![self.spawn(Owner::Player, muzzle, vel)]
        }
    }

    pub fn fire_enemy(&mut self, from: Vec2) -> ProjectileId {
        self.spawn(Owner::Enemy, from, Vec2::new(0.0, ENEMY_SHOT_SPEED))
    }

    /// Move everything by `dt` seconds and drop what left the play area
    pub fn integrate(&mut self, dt: f32) -> usize {
        for p in &mut self.items {
            p.pos += p.vel * dt;
        }
        let before = self.items.len();
        self.items
            .retain(|p| p.pos.y >= 0.0 && p.pos.y <= PLAY_HEIGHT && p.pos.x >= 0.0 && p.pos.x <= PLAY_WIDTH);
        before - self.items.len()
    }

    /// Remove a projectile. Returns it if it was still in flight.
    pub fn take(&mut self, id: ProjectileId) -> Option<Projectile> {
        let index = self.items.iter().position(|p| p.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.items.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn spawn(&mut self, owner: Owner, pos: Vec2, vel: Vec2) -> ProjectileId {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Projectile { id, owner, pos, vel });
        id
    }
}

/// Barrier between the player and the formation; absorbs enemy shots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shield {
    pub pos: Vec2,
    pub hit_points: u8,
}

impl Shield {
    pub fn new(hit_points: u8) -> Self {
        Self {
            pos: Vec2::new(PLAY_WIDTH / 2.0, SHIELD_Y),
            hit_points,
        }
    }

    /// Take one hit. Returns the remaining hit points.
    pub fn absorb(&mut self) -> u8 {
        self.hit_points = self.hit_points.saturating_sub(1);
        self.hit_points
    }

    pub fn is_down(&self) -> bool {
        self.hit_points == 0
    }

    /// 1.0 at full strength, 0.0 when down; drives the visible degradation
    pub fn integrity(&self) -> f32 {
        self.hit_points as f32 / SHIELD_HIT_POINTS as f32
    }
}
