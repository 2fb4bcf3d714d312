use std::collections::{HashMap, HashSet};

use arena_core::{Bullet, BulletId, GamePhase, PlayerId, Scores, Team};
use arena_protocol::{BulletState, PlayerState, ServerMsg};

use crate::sim::{Player, RoomState};

/// Turns the authoritative room state into a per-tick diff stream: entity
/// add/remove against the previously replicated id sets, an update per
/// present player, and a state-changed message on phase/score mutation.
pub struct Replicator {
    players: HashSet<PlayerId>,
    bullets: HashMap<BulletId, f32>,
    phase: GamePhase,
    scores: Scores,
    winning_team: Option<Team>,
}

impl Replicator {
    pub fn new() -> Self {
        Self {
            players: HashSet::new(),
            bullets: HashMap::new(),
            phase: GamePhase::Waiting,
            scores: Scores::default(),
            winning_team: None,
        }
    }

    pub fn diff(&mut self, state: &RoomState, out: &mut Vec<ServerMsg>) {
        self.players.retain(|id| {
            if state.players.contains_key(id) {
                true
            } else {
                out.push(ServerMsg::PlayerRemoved { player_id: *id });
                false
            }
        });

        for (id, player) in &state.players {
            let wire = player_wire(player);
            if self.players.insert(*id) {
                out.push(ServerMsg::PlayerAdded { player: wire });
            } else {
                out.push(ServerMsg::PlayerUpdated { player: wire });
            }
        }

        // Removed bullets report the last position this replicator saw so
        // clients can place the impact effect.
        self.bullets.retain(|id, last_x| {
            if state.bullets.iter().any(|b| b.id == *id) {
                true
            } else {
                out.push(ServerMsg::BulletRemoved {
                    bullet_id: *id,
                    x: *last_x,
                });
                false
            }
        });

        for bullet in &state.bullets {
            if self.bullets.insert(bullet.id, bullet.x).is_none() {
                out.push(ServerMsg::BulletAdded {
                    bullet: bullet_wire(bullet),
                });
            }
        }

        if self.phase != state.phase
            || self.scores != state.scores
            || self.winning_team != state.winning_team
        {
            self.phase = state.phase;
            self.scores = state.scores;
            self.winning_team = state.winning_team;
            out.push(ServerMsg::StateChanged {
                game_state: state.phase,
                scores: state.scores,
                winning_team: state.winning_team,
            });
        }
    }
}

impl Default for Replicator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn player_wire(player: &Player) -> PlayerState {
    PlayerState {
        id: player.id,
        name: player.name.clone(),
        team: player.team,
        x: player.x,
        y: player.y,
        velocity_x: player.velocity_x,
        velocity_y: player.velocity_y,
        flip_x: player.flip_x,
        health: player.health,
        is_dead: player.is_dead,
        respawn_timer_ms: player.respawn_timer_ms.max(0.0),
        is_dashing: player.is_dashing,
    }
}

pub fn bullet_wire(bullet: &Bullet) -> BulletState {
    BulletState {
        id: bullet.id,
        x: bullet.x,
        y: bullet.y,
        velocity_x: bullet.velocity_x,
        owner_id: bullet.owner_id,
        owner_team: bullet.owner_team,
    }
}

/// Full-state sync for a freshly joined client.
pub fn room_state_wire(room_id: &str, state: &RoomState) -> ServerMsg {
    ServerMsg::RoomState {
        room_id: room_id.to_string(),
        players: state.players.values().map(player_wire).collect(),
        bullets: state.bullets.iter().map(bullet_wire).collect(),
        scores: state.scores,
        game_state: state.phase,
        winning_team: state.winning_team,
        game_time_ms: state.game_time_ms,
    }
}
