pub const TICK_HZ: u32 = 60;
pub const TICK_MILLIS: u64 = 16;

pub const BULLET_SPEED: f32 = 1500.0;
pub const BULLET_LIFETIME_MS: u64 = 2000;
pub const BULLET_DAMAGE: i32 = 25;
pub const BULLET_WIDTH: f32 = 8.0;
pub const BULLET_HEIGHT: f32 = 4.0;
pub const BULLET_HALF_W: f32 = BULLET_WIDTH / 2.0;
pub const BULLET_HALF_H: f32 = BULLET_HEIGHT / 2.0;

pub const PLAYER_HALF_W: f32 = 18.0;
pub const PLAYER_HALF_H: f32 = 26.0;
pub const MAX_HEALTH: i32 = 100;
pub const RESPAWN_MS: f64 = 3000.0;

pub const WIN_SCORE: u32 = 30;
pub const MAX_CLIENTS: usize = 8;

pub const RED_SPAWN: (f32, f32) = (200.0, 500.0);
pub const BLUE_SPAWN: (f32, f32) = (2800.0, 500.0);
pub const WORLD_MIN_X: f32 = -100.0;
pub const WORLD_MAX_X: f32 = 3100.0;

pub const RECONCILE_DEAD_BAND_PX: f32 = 5.0;
pub const SNAP_THRESHOLD_PX: f32 = 100.0;
pub const SNAP_THRESHOLD_DASH_PX: f32 = 300.0;
pub const RECONCILE_RATE: f32 = 0.3;
pub const RECONCILE_SETTLE_PX: f32 = 0.1;
pub const DASH_SNAP_GRACE_MS: f64 = 250.0;

pub const REMOTE_LERP_PER_FRAME: f32 = 0.2;
pub const QUALITY_GREEN_PX: f32 = 50.0;
pub const QUALITY_YELLOW_PX: f32 = 100.0;
pub const OWN_BULLET_MATCH_PX: f32 = 50.0;
