use std::collections::HashMap;

use arena_core::constants::{BULLET_LIFETIME_MS, OWN_BULLET_MATCH_PX};
use arena_core::{BulletId, Team};
use arena_protocol::BulletState;

use crate::render::{CmdVec, RenderCmd};

/// A replicated enemy/teammate bullet mirrored to a local visual. Travel is
/// predicted from the spawn sample; the server only confirms removal.
#[derive(Clone, Debug)]
pub struct TrackedBullet {
    pub id: BulletId,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub color_team: Team,
    pub ttl_ms: f64,
}

/// A bullet the local player fired, pooled by the shell and matched against
/// server removals by position.
#[derive(Clone, Copy, Debug)]
pub struct OwnBullet {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub ttl_ms: f64,
    pub active: bool,
}

pub struct BulletTracker {
    tracked: HashMap<BulletId, TrackedBullet>,
    own: Vec<OwnBullet>,
}

impl BulletTracker {
    pub fn new() -> Self {
        Self {
            tracked: HashMap::new(),
            own: Vec::new(),
        }
    }

    /// Mirror a replicated bullet. `owner_team` comes from the owner lookup;
    /// an unknown owner renders red.
    pub fn track(&mut self, bullet: &BulletState, owner_team: Option<Team>) {
        self.tracked.insert(
            bullet.id,
            TrackedBullet {
                id: bullet.id,
                x: bullet.x,
                y: bullet.y,
                velocity_x: bullet.velocity_x,
                color_team: owner_team.unwrap_or(Team::Red),
                ttl_ms: BULLET_LIFETIME_MS as f64,
            },
        );
    }

    pub fn register_own(&mut self, x: f32, y: f32, velocity_x: f32) {
        // Reuse an inactive pool slot before growing.
        if let Some(slot) = self.own.iter_mut().find(|b| !b.active) {
            *slot = OwnBullet {
                x,
                y,
                velocity_x,
                ttl_ms: BULLET_LIFETIME_MS as f64,
                active: true,
            };
            return;
        }
        self.own.push(OwnBullet {
            x,
            y,
            velocity_x,
            ttl_ms: BULLET_LIFETIME_MS as f64,
            active: true,
        });
    }

    /// Advance every visual by one frame; expired visuals despawn quietly
    /// (the authoritative removal already happened or is in flight).
    pub fn advance(&mut self, dt_ms: f64) {
        let dt = (dt_ms / 1000.0) as f32;
        self.tracked.retain(|_, bullet| {
            bullet.x += bullet.velocity_x * dt;
            bullet.ttl_ms -= dt_ms;
            bullet.ttl_ms > 0.0
        });
        for bullet in self.own.iter_mut().filter(|b| b.active) {
            bullet.x += bullet.velocity_x * dt;
            bullet.ttl_ms -= dt_ms;
            if bullet.ttl_ms <= 0.0 {
                bullet.active = false;
            }
        }
    }

    /// Authoritative removal. Tracked bullets impact at their last visual
    /// position; own bullets are matched within 50 px of the reported x.
    pub fn on_removed(&mut self, id: BulletId, reported_x: f32, own: bool, cmds: &mut CmdVec) {
        if own {
            if let Some(bullet) = self
                .own
                .iter_mut()
                .find(|b| b.active && (b.x - reported_x).abs() <= OWN_BULLET_MATCH_PX)
            {
                bullet.active = false;
                cmds.push(RenderCmd::Impact {
                    x: bullet.x,
                    y: bullet.y,
                });
            }
            return;
        }

        if let Some(bullet) = self.tracked.remove(&id) {
            cmds.push(RenderCmd::Impact {
                x: bullet.x,
                y: bullet.y,
            });
        }
    }

    pub fn visuals(&self) -> impl Iterator<Item = &TrackedBullet> {
        self.tracked.values()
    }

    pub fn own_pool(&self) -> &[OwnBullet] {
        &self.own
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
        self.own.clear();
    }
}

impl Default for BulletTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::constants::BULLET_SPEED;
    use arena_core::PlayerId;

    fn bullet_state(owner: u64, seq: u64, x: f32) -> BulletState {
        BulletState {
            id: BulletId {
                owner: PlayerId(owner),
                seq,
            },
            x,
            y: 480.0,
            velocity_x: BULLET_SPEED,
            owner_id: PlayerId(owner),
            owner_team: Team::Blue,
        }
    }

    #[test]
    fn removal_places_the_impact_at_the_last_visual_position() {
        let mut tracker = BulletTracker::new();
        let state = bullet_state(2, 1, 100.0);
        tracker.track(&state, Some(Team::Blue));

        // Two frames of predicted travel.
        tracker.advance(1000.0 / 60.0);
        tracker.advance(1000.0 / 60.0);
        let visual_x = tracker.visuals().next().expect("tracked bullet").x;
        assert!(visual_x > 100.0);

        let mut cmds = CmdVec::new();
        tracker.on_removed(state.id, visual_x + 10.0, false, &mut cmds);
        assert_eq!(cmds.as_slice(), [RenderCmd::Impact { x: visual_x, y: 480.0 }]);
        assert!(tracker.visuals().next().is_none());

        // Second removal for the same id is a no-op.
        cmds.clear();
        tracker.on_removed(state.id, visual_x, false, &mut cmds);
        assert!(cmds.is_empty());
    }

    #[test]
    fn unknown_owner_falls_back_to_red() {
        let mut tracker = BulletTracker::new();
        tracker.track(&bullet_state(9, 1, 100.0), None);
        assert_eq!(
            tracker.visuals().next().expect("tracked").color_team,
            Team::Red
        );
    }

    #[test]
    fn own_bullet_matches_within_fifty_pixels() {
        let mut tracker = BulletTracker::new();
        tracker.register_own(1000.0, 480.0, BULLET_SPEED);

        let id = BulletId {
            owner: PlayerId(1),
            seq: 1,
        };
        let mut cmds = CmdVec::new();
        // Reported 120 px away: no match, pool untouched.
        tracker.on_removed(id, 1120.0, true, &mut cmds);
        assert!(cmds.is_empty());
        assert!(tracker.own_pool()[0].active);

        // Within tolerance: deactivate and emit the impact.
        tracker.on_removed(id, 1040.0, true, &mut cmds);
        assert!(!tracker.own_pool()[0].active);
        assert_eq!(cmds.as_slice(), [RenderCmd::Impact { x: 1000.0, y: 480.0 }]);
    }

    #[test]
    fn pool_slots_are_reused_after_deactivation() {
        let mut tracker = BulletTracker::new();
        tracker.register_own(100.0, 480.0, BULLET_SPEED);
        let id = BulletId {
            owner: PlayerId(1),
            seq: 1,
        };
        let mut cmds = CmdVec::new();
        tracker.on_removed(id, 100.0, true, &mut cmds);

        tracker.register_own(200.0, 480.0, -BULLET_SPEED);
        assert_eq!(tracker.own_pool().len(), 1);
        assert!(tracker.own_pool()[0].active);
        assert_eq!(tracker.own_pool()[0].x, 200.0);
    }

    #[test]
    fn visual_lifetime_expires_quietly() {
        let mut tracker = BulletTracker::new();
        tracker.track(&bullet_state(2, 1, 100.0), Some(Team::Blue));
        tracker.register_own(100.0, 480.0, BULLET_SPEED);

        tracker.advance(BULLET_LIFETIME_MS as f64 + 1.0);
        assert!(tracker.visuals().next().is_none());
        assert!(!tracker.own_pool()[0].active);
    }
}
