use arena_core::constants::{
    DASH_SNAP_GRACE_MS, RECONCILE_DEAD_BAND_PX, RECONCILE_RATE, RECONCILE_SETTLE_PX,
    SNAP_THRESHOLD_DASH_PX, SNAP_THRESHOLD_PX,
};
use arena_protocol::{ClientMsg, PlayerState};

use crate::render::{CmdVec, InputSample, RenderCmd};

const DEATH_ALPHA: f32 = 0.4;

/// Locally predicted player. Input applies immediately; authoritative
/// updates correct the prediction through a dead band, a bounded error
/// bleed, or a teleport when the error is too large to hide.
#[derive(Clone, Debug)]
pub struct LocalPlayer {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub flip_x: bool,
    pub is_dashing: bool,
    pub health: i32,
    pub is_dead: bool,
    pub respawn_timer_ms: f64,
    error_x: f32,
    error_y: f32,
    dash_grace_ms: f64,
    move_seq: u64,
}

impl LocalPlayer {
    pub fn from_state(state: &PlayerState) -> Self {
        Self {
            x: state.x,
            y: state.y,
            velocity_x: state.velocity_x,
            velocity_y: state.velocity_y,
            flip_x: state.flip_x,
            is_dashing: state.is_dashing,
            health: state.health,
            is_dead: state.is_dead,
            respawn_timer_ms: state.respawn_timer_ms,
            error_x: 0.0,
            error_y: 0.0,
            dash_grace_ms: 0.0,
            move_seq: 0,
        }
    }

    /// One frame of local simulation plus error bleed-off.
    pub fn advance(&mut self, dt_ms: f64, input: &InputSample) {
        if input.is_dashing {
            self.dash_grace_ms = DASH_SNAP_GRACE_MS;
        } else if self.dash_grace_ms > 0.0 {
            self.dash_grace_ms -= dt_ms;
        }
        self.is_dashing = input.is_dashing;

        if self.is_dead {
            return;
        }

        let dt = (dt_ms / 1000.0) as f32;
        self.velocity_x = input.velocity_x;
        self.velocity_y = input.velocity_y;
        if input.velocity_x > 0.0 {
            self.flip_x = false;
        } else if input.velocity_x < 0.0 {
            self.flip_x = true;
        }
        self.x += self.velocity_x * dt;
        self.y += self.velocity_y * dt;

        if self.error_x != 0.0 || self.error_y != 0.0 {
            let decay = (1.0 - RECONCILE_RATE * dt).max(0.0);
            let next_error_x = self.error_x * decay;
            let next_error_y = self.error_y * decay;
            // The shrink is applied to the visible position, walking it
            // toward the authoritative one.
            self.x += self.error_x - next_error_x;
            self.y += self.error_y - next_error_y;
            if next_error_x.abs() < RECONCILE_SETTLE_PX && next_error_y.abs() < RECONCILE_SETTLE_PX
            {
                self.error_x = 0.0;
                self.error_y = 0.0;
            } else {
                self.error_x = next_error_x;
                self.error_y = next_error_y;
            }
        }
    }

    /// Correct against an authoritative sample.
    pub fn reconcile(&mut self, server: &PlayerState, cmds: &mut CmdVec) {
        let ex = server.x - self.x;
        let ey = server.y - self.y;
        let magnitude = (ex * ex + ey * ey).sqrt();

        if magnitude <= RECONCILE_DEAD_BAND_PX {
            self.error_x = 0.0;
            self.error_y = 0.0;
        } else if magnitude <= self.snap_threshold() {
            self.error_x = ex;
            self.error_y = ey;
        } else {
            self.x = server.x;
            self.y = server.y;
            self.error_x = 0.0;
            self.error_y = 0.0;
        }

        if server.health < self.health && server.health > 0 {
            cmds.push(RenderCmd::LocalHit);
        }
        if server.is_dead && !self.is_dead {
            self.velocity_x = 0.0;
            self.velocity_y = 0.0;
            cmds.push(RenderCmd::LocalDeath);
            cmds.push(RenderCmd::SetLocalAlpha { alpha: DEATH_ALPHA });
        } else if !server.is_dead && self.is_dead {
            cmds.push(RenderCmd::LocalRespawn);
            cmds.push(RenderCmd::SetLocalAlpha { alpha: 1.0 });
        }
        self.health = server.health;
        self.is_dead = server.is_dead;
        self.respawn_timer_ms = server.respawn_timer_ms;
    }

    /// 100 px normally, 300 px while dashing or shortly after; fast moves
    /// legitimately diverge further from the server.
    fn snap_threshold(&self) -> f32 {
        if self.is_dashing || self.dash_grace_ms > 0.0 {
            SNAP_THRESHOLD_DASH_PX
        } else {
            SNAP_THRESHOLD_PX
        }
    }

    pub fn prediction_error(&self) -> (f32, f32) {
        (self.error_x, self.error_y)
    }

    pub fn respawn_countdown_secs(&self) -> u32 {
        (self.respawn_timer_ms / 1000.0).ceil().max(0.0) as u32
    }

    /// The outbound pose message for this frame.
    pub fn next_move_msg(&mut self) -> ClientMsg {
        self.move_seq += 1;
        ClientMsg::Move {
            seq: self.move_seq,
            x: self.x,
            y: self.y,
            velocity_x: self.velocity_x,
            velocity_y: self.velocity_y,
            flip_x: self.flip_x,
        }
    }
}
