#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod bullet;
pub mod constants;
pub mod geometry;
pub mod types;

pub use bullet::{scan_players, Bullet, BulletId, BulletSweep};
pub use geometry::{hits_platform, off_world, player_aabb, swept_bullet_aabb, Rect, PLATFORMS};
pub use types::{pick_team, GamePhase, PlayerId, Scores, Team};
