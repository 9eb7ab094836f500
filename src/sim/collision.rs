//! Overlap detection between projectiles and their targets
//!
//! Stands in for the engine's collision notifier: it reports every
//! overlapping (projectile, target) pair on every call, so the same pair can
//! be reported across consecutive frames until one side is removed. The
//! round's contact handler is responsible for ignoring duplicates.

use glam::Vec2;

use super::formation::{EnemyFormationController, EnemyId};
use super::projectile::{Owner, ProjectileId, Projectiles, Shield};
use crate::consts::*;

/// What a projectile touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Enemy(EnemyId),
    Shield,
    Player,
}

/// One overlapping pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Contact {
    pub projectile: ProjectileId,
    pub target: Target,
}

/// Axis-aligned box given by centre and half extents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec2,
    pub half: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, half: Vec2) -> Self {
        Self { center, half }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d = (self.center - other.center).abs();
        d.x <= self.half.x + other.half.x && d.y <= self.half.y + other.half.y
    }
}

fn shot_box(pos: Vec2) -> Aabb {
    Aabb::new(pos, Vec2::new(SHOT_HALF_WIDTH, SHOT_HALF_HEIGHT))
}

/// Every overlapping pair this frame, in projectile order.
///
/// A player shot reports at most one enemy (the first live one by id). An
/// enemy shot reports the shield before the player when both overlap.
pub fn detect_contacts(
    projectiles: &Projectiles,
    formation: &EnemyFormationController,
    shield: Option<&Shield>,
    player_pos: Vec2,
) -> Vec<Contact> {
    let player_box = Aabb::new(player_pos, Vec2::splat(PLAYER_HALF_EXTENT));
    let shield_box = shield
        .filter(|s| !s.is_down())
        .map(|s| Aabb::new(s.pos, Vec2::new(SHIELD_HALF_WIDTH, SHIELD_HALF_HEIGHT)));

    let mut contacts = Vec::new();
    for p in projectiles.iter() {
        let shot = shot_box(p.pos);
        let target = match p.owner {
            Owner::Player => formation
                .live()
                .find(|e| shot.overlaps(&Aabb::new(e.pos, Vec2::splat(ENEMY_HALF_EXTENT))))
                .map(|e| Target::Enemy(e.id)),
            Owner::Enemy => {
                if shield_box.is_some_and(|b| shot.overlaps(&b)) {
                    Some(Target::Shield)
                } else if shot.overlaps(&player_box) {
                    Some(Target::Player)
                } else {
                    None
                }
            }
        };
        if let Some(target) = target {
            contacts.push(Contact {
                projectile: p.id,
                target,
            });
        }
    }
    contacts
}
