use smallvec::SmallVec;

use arena_core::{PlayerId, Scores, Team};

/// Network-quality bands for the per-player indicator, keyed off the
/// distance between a remote's visual and target positions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QualityBand {
    Green,
    Yellow,
    Red,
}

/// Commands for the external rendering/effects/audio systems. The core
/// decides when and where; ownership of the actual effect lives outside.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderCmd {
    Impact { x: f32, y: f32 },
    LocalHit,
    LocalDeath,
    LocalRespawn,
    SetLocalAlpha { alpha: f32 },
    RespawnCountdown { seconds: u32 },
    RemoteDied { player_id: PlayerId },
    RemoteRespawned { player_id: PlayerId },
    QualityIndicator { player_id: PlayerId, band: QualityBand },
    KillFeed { killer_name: String, victim_name: String },
    MatchOver { winning_team: Team, scores: Scores },
}

pub type CmdVec = SmallVec<[RenderCmd; 16]>;

/// One frame of input, produced by the external movement state machine.
/// Velocities are already resolved; the core integrates and replicates them.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputSample {
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub is_dashing: bool,
}
