use arena_core::constants::{QUALITY_GREEN_PX, QUALITY_YELLOW_PX, REMOTE_LERP_PER_FRAME};
use arena_core::{PlayerId, Team};
use arena_protocol::PlayerState;

use crate::render::{CmdVec, QualityBand, RenderCmd};

/// A remote player's render state: the last authoritative sample as the
/// target, and a visual position eased toward it each frame. Everything
/// except position mirrors the server immediately.
#[derive(Clone, Debug)]
pub struct RemotePlayer {
    pub id: PlayerId,
    pub name: String,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub flip_x: bool,
    pub is_dashing: bool,
    pub is_dead: bool,
    pub health: i32,
}

impl RemotePlayer {
    pub fn new(state: &PlayerState) -> Self {
        Self {
            id: state.id,
            name: state.name.clone(),
            team: state.team,
            x: state.x,
            y: state.y,
            target_x: state.x,
            target_y: state.y,
            velocity_x: state.velocity_x,
            velocity_y: state.velocity_y,
            flip_x: state.flip_x,
            is_dashing: state.is_dashing,
            is_dead: state.is_dead,
            health: state.health,
        }
    }

    pub fn apply_update(&mut self, state: &PlayerState, cmds: &mut CmdVec) {
        self.target_x = state.x;
        self.target_y = state.y;
        self.velocity_x = state.velocity_x;
        self.velocity_y = state.velocity_y;
        self.flip_x = state.flip_x;
        self.is_dashing = state.is_dashing;
        self.health = state.health;

        if state.is_dead && !self.is_dead {
            self.velocity_x = 0.0;
            self.velocity_y = 0.0;
            cmds.push(RenderCmd::RemoteDied { player_id: self.id });
        } else if !state.is_dead && self.is_dead {
            // Respawn is a teleport, not a glide across the map.
            self.x = state.x;
            self.y = state.y;
            cmds.push(RenderCmd::RemoteRespawned { player_id: self.id });
        }
        self.is_dead = state.is_dead;
    }

    /// One frame of exponential easing toward the latest server sample.
    pub fn interpolate(&mut self) {
        self.x += (self.target_x - self.x) * REMOTE_LERP_PER_FRAME;
        self.y += (self.target_y - self.y) * REMOTE_LERP_PER_FRAME;
    }

    pub fn prediction_distance(&self) -> f32 {
        let dx = self.target_x - self.x;
        let dy = self.target_y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn quality_band(&self) -> QualityBand {
        let distance = self.prediction_distance();
        if distance <= QUALITY_GREEN_PX {
            QualityBand::Green
        } else if distance <= QUALITY_YELLOW_PX {
            QualityBand::Yellow
        } else {
            QualityBand::Red
        }
    }
}
