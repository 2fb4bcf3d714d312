use serde::{Deserialize, Serialize};

use crate::geometry::{hits_platform, off_world, player_aabb, swept_bullet_aabb, Rect};
use crate::types::{PlayerId, Team};

/// Bullet identity: owner plus a per-owner monotonic shot counter. Two shots
/// from the same owner in the same millisecond stay distinct.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BulletId {
    pub owner: PlayerId,
    pub seq: u64,
}

impl std::fmt::Display for BulletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.owner.0, self.seq)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Bullet {
    pub id: BulletId,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub owner_id: PlayerId,
    pub owner_team: Team,
}

/// Outcome of sweeping one bullet forward one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BulletSweep {
    Flying { next_x: f32 },
    HitPlayer(PlayerId),
    HitPlatform { next_x: f32 },
    OffWorld { next_x: f32 },
}

impl Bullet {
    /// Continuous collision detection for one tick of travel. `candidates`
    /// must already be filtered to live enemies of the owner; the first one
    /// whose hitbox overlaps the swept box wins and the scan stops.
    pub fn sweep<I>(&self, dt_secs: f32, candidates: I) -> BulletSweep
    where
        I: IntoIterator<Item = (PlayerId, f32, f32)>,
    {
        let next_x = self.x + self.velocity_x * dt_secs;
        let swept = swept_bullet_aabb(self.x, next_x, self.y);

        if let Some(target) = scan_players(&swept, candidates) {
            return BulletSweep::HitPlayer(target);
        }
        if hits_platform(next_x, self.y) {
            return BulletSweep::HitPlatform { next_x };
        }
        if off_world(next_x) {
            return BulletSweep::OffWorld { next_x };
        }
        BulletSweep::Flying { next_x }
    }
}

/// First candidate whose hitbox overlaps `swept`, in iteration order.
pub fn scan_players<I>(swept: &Rect, candidates: I) -> Option<PlayerId>
where
    I: IntoIterator<Item = (PlayerId, f32, f32)>,
{
    candidates
        .into_iter()
        .find(|&(_, x, y)| swept.intersects(&player_aabb(x, y)))
        .map(|(id, _, _)| id)
}
