#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

//! Wire messages between client and server. Everything rides an ordered
//! reliable channel per client as JSON text frames; the server additionally
//! fans replication diffs out to every member of a room.

use serde::{Deserialize, Serialize};

use arena_core::{BulletId, GamePhase, PlayerId, Scores, Team};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMsg {
    Join {
        name: Option<String>,
        room: Option<String>,
    },
    /// Client-simulated pose. The server trusts position, velocity and
    /// facing but never bullet velocity.
    Move {
        seq: u64,
        x: f32,
        y: f32,
        velocity_x: f32,
        velocity_y: f32,
        flip_x: bool,
    },
    Dash {
        is_dashing: bool,
    },
    Shoot {
        x: f32,
        y: f32,
    },
    Ping {
        client_time_ms: u64,
    },
    Leave,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMsg {
    TeamAssigned {
        team: Team,
        player_id: PlayerId,
        room_id: String,
        player_name: String,
    },
    /// Full sync sent once to the joining client; diffs take over afterwards.
    RoomState {
        room_id: String,
        players: Vec<PlayerState>,
        bullets: Vec<BulletState>,
        scores: Scores,
        game_state: GamePhase,
        winning_team: Option<Team>,
        game_time_ms: f64,
    },
    JoinRejected {
        reason: String,
    },
    Pong {
        client_time_ms: u64,
        server_time_ms: u64,
    },

    PlayerAdded {
        player: PlayerState,
    },
    PlayerUpdated {
        player: PlayerState,
    },
    PlayerRemoved {
        player_id: PlayerId,
    },
    BulletAdded {
        bullet: BulletState,
    },
    BulletRemoved {
        bullet_id: BulletId,
        x: f32,
    },
    StateChanged {
        game_state: GamePhase,
        scores: Scores,
        winning_team: Option<Team>,
    },

    PlayerKilled {
        killer_id: PlayerId,
        victim_id: PlayerId,
        killer_name: String,
        victim_name: String,
    },
    MatchEnded {
        winning_team: Team,
        scores: Scores,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub flip_x: bool,
    pub health: i32,
    pub is_dead: bool,
    pub respawn_timer_ms: f64,
    pub is_dashing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletState {
    pub id: BulletId,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub owner_id: PlayerId,
    pub owner_team: Team,
}

/// Lobby-visible room metadata, refreshed on join/leave and phase changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMetadata {
    pub red_count: usize,
    pub blue_count: usize,
    pub game_state: GamePhase,
}

impl Default for RoomMetadata {
    fn default() -> Self {
        Self {
            red_count: 0,
            blue_count: 0,
            game_state: GamePhase::Waiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_tags_use_kebab_case() {
        let msg = ServerMsg::TeamAssigned {
            team: Team::Red,
            player_id: PlayerId(7),
            room_id: "room-1".to_string(),
            player_name: "alice".to_string(),
        };
        let json = serde_json::to_string(&msg).expect("encode");
        assert!(json.contains("\"type\":\"team-assigned\""));
        assert!(json.contains("\"team\":\"red\""));
    }

    #[test]
    fn client_move_round_trips() {
        let json = r#"{"type":"move","seq":3,"x":10.5,"y":500.0,"velocity_x":-120.0,"velocity_y":0.0,"flip_x":true}"#;
        let msg: ClientMsg = serde_json::from_str(json).expect("decode");
        match msg {
            ClientMsg::Move { seq, flip_x, x, .. } => {
                assert_eq!(seq, 3);
                assert!(flip_x);
                assert_eq!(x, 10.5);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn shoot_carries_position_only() {
        // The server computes bullet velocity; the shoot message has no
        // velocity field to smuggle one through.
        let json = serde_json::to_string(&ClientMsg::Shoot { x: 100.0, y: 480.0 }).expect("encode");
        assert!(!json.contains("velocity"));
    }
}
