#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

//! Client-side reconciliation core: local prediction, remote interpolation
//! and bullet mirroring over a typed session event stream. Rendering,
//! sound, input devices and the transport itself live outside; the
//! coordinator consumes input samples plus server messages and produces
//! render commands plus outgoing wire messages.

pub mod bullets;
pub mod prediction;
pub mod remote;
pub mod render;
pub mod session;

use std::collections::HashMap;

use tracing::warn;

use arena_core::constants::BULLET_SPEED;
use arena_core::{GamePhase, PlayerId, Scores, Team};
use arena_protocol::{ClientMsg, ServerMsg};

use crate::bullets::BulletTracker;
use crate::prediction::LocalPlayer;
use crate::remote::RemotePlayer;
pub use crate::render::{CmdVec, InputSample, QualityBand, RenderCmd};
pub use crate::session::{Session, SessionEvent};

pub struct MultiplayerClient {
    session: Session,
    local: Option<LocalPlayer>,
    remotes: HashMap<PlayerId, RemotePlayer>,
    bullets: BulletTracker,
    quality_indicators: bool,
    last_dash_sent: bool,
    outbox: Vec<ClientMsg>,
    pub scores: Scores,
    pub game_state: GamePhase,
    pub winning_team: Option<Team>,
}

impl MultiplayerClient {
    pub fn new() -> Self {
        Self {
            session: Session::new(),
            local: None,
            remotes: HashMap::new(),
            bullets: BulletTracker::new(),
            quality_indicators: false,
            last_dash_sent: false,
            outbox: Vec::new(),
            scores: Scores::default(),
            game_state: GamePhase::Waiting,
            winning_team: None,
        }
    }

    pub fn join(&mut self, name: Option<String>, room: Option<String>) {
        self.outbox.push(ClientMsg::Join { name, room });
    }

    pub fn ping(&mut self, now_ms: u64) {
        self.outbox.push(ClientMsg::Ping {
            client_time_ms: now_ms,
        });
    }

    /// Feed one inbound server message; visual side effects land in `cmds`.
    pub fn handle_server_message(&mut self, msg: ServerMsg, now_ms: u64, cmds: &mut CmdVec) {
        self.session.handle_message(msg, now_ms);
        while let Some(event) = self.session.poll_event() {
            self.apply_event(event, cmds);
        }
    }

    fn apply_event(&mut self, event: SessionEvent, cmds: &mut CmdVec) {
        match event {
            SessionEvent::TeamAssigned { .. } => {}
            SessionEvent::JoinRejected { reason } => {
                warn!(%reason, "join rejected");
            }
            SessionEvent::LocalPlayerUpdate(state) => match self.local.as_mut() {
                Some(local) => local.reconcile(&state, cmds),
                None => self.local = Some(LocalPlayer::from_state(&state)),
            },
            SessionEvent::PlayerAdded(state) => {
                self.remotes.insert(state.id, RemotePlayer::new(&state));
            }
            SessionEvent::PlayerUpdated(state) => {
                if let Some(remote) = self.remotes.get_mut(&state.id) {
                    remote.apply_update(&state, cmds);
                }
            }
            SessionEvent::PlayerRemoved(player_id) => {
                self.remotes.remove(&player_id);
            }
            SessionEvent::BulletAdded(bullet) => {
                if self.session.local_id() == Some(bullet.owner_id) {
                    // Our own shots already exist in the local pool.
                    return;
                }
                let owner_team = self.remotes.get(&bullet.owner_id).map(|r| r.team);
                self.bullets.track(&bullet, owner_team);
            }
            SessionEvent::BulletRemoved { bullet_id, x } => {
                let own = self.session.local_id() == Some(bullet_id.owner);
                self.bullets.on_removed(bullet_id, x, own, cmds);
            }
            SessionEvent::StateChanged {
                game_state,
                scores,
                winning_team,
            } => {
                self.game_state = game_state;
                self.scores = scores;
                self.winning_team = winning_team;
            }
            SessionEvent::PlayerKilled {
                killer_name,
                victim_name,
                ..
            } => {
                cmds.push(RenderCmd::KillFeed {
                    killer_name,
                    victim_name,
                });
            }
            SessionEvent::MatchEnded {
                winning_team,
                scores,
            } => {
                self.game_state = GamePhase::Ended;
                self.winning_team = Some(winning_team);
                self.scores = scores;
                cmds.push(RenderCmd::MatchOver {
                    winning_team,
                    scores,
                });
            }
        }
    }

    /// One render frame: local prediction, remote easing, bullet travel.
    pub fn update(&mut self, dt_ms: f64, input: &InputSample, cmds: &mut CmdVec) {
        if let Some(local) = self.local.as_mut() {
            local.advance(dt_ms, input);
            self.outbox.push(local.next_move_msg());

            if input.is_dashing != self.last_dash_sent {
                self.last_dash_sent = input.is_dashing;
                self.outbox.push(ClientMsg::Dash {
                    is_dashing: input.is_dashing,
                });
            }
            if local.is_dead {
                cmds.push(RenderCmd::RespawnCountdown {
                    seconds: local.respawn_countdown_secs(),
                });
            }
        }

        for remote in self.remotes.values_mut() {
            remote.interpolate();
            if self.quality_indicators {
                cmds.push(RenderCmd::QualityIndicator {
                    player_id: remote.id,
                    band: remote.quality_band(),
                });
            }
        }

        self.bullets.advance(dt_ms);
    }

    /// Fire: enqueue the wire message and spawn the local visual at the
    /// muzzle; the server echoes authoritative removal later.
    pub fn shoot(&mut self, x: f32, y: f32) {
        let Some(local) = self.local.as_ref() else {
            return;
        };
        if local.is_dead {
            return;
        }
        self.outbox.push(ClientMsg::Shoot { x, y });
        let velocity_x = if local.flip_x {
            -BULLET_SPEED
        } else {
            BULLET_SPEED
        };
        self.bullets.register_own(x, y, velocity_x);
    }

    pub fn toggle_quality_indicators(&mut self) {
        self.quality_indicators = !self.quality_indicators;
    }

    pub fn local(&self) -> Option<&LocalPlayer> {
        self.local.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn remotes(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.remotes.values()
    }

    pub fn bullets(&self) -> &BulletTracker {
        &self.bullets
    }

    pub fn take_outgoing(&mut self) -> Vec<ClientMsg> {
        std::mem::take(&mut self.outbox)
    }

    /// Leaving multiplayer (or losing the transport) tears everything down.
    pub fn leave(&mut self) {
        self.outbox.push(ClientMsg::Leave);
        self.local = None;
        self.remotes.clear();
        self.bullets.clear();
        self.session.reset();
        self.scores = Scores::default();
        self.game_state = GamePhase::Waiting;
        self.winning_team = None;
    }
}

impl Default for MultiplayerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::BulletId;
    use arena_protocol::{BulletState, PlayerState};

    const FRAME_MS: f64 = 1000.0 / 60.0;

    fn wire_player(id: u64, team: Team, x: f32) -> PlayerState {
        PlayerState {
            id: PlayerId(id),
            name: format!("p{id}"),
            team,
            x,
            y: 500.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
            flip_x: false,
            health: 100,
            is_dead: false,
            respawn_timer_ms: 0.0,
            is_dashing: false,
        }
    }

    fn joined_client() -> (MultiplayerClient, CmdVec) {
        let mut client = MultiplayerClient::new();
        let mut cmds = CmdVec::new();
        client.handle_server_message(
            ServerMsg::TeamAssigned {
                team: Team::Red,
                player_id: PlayerId(1),
                room_id: "room-1".to_string(),
                player_name: "p1".to_string(),
            },
            0,
            &mut cmds,
        );
        client.handle_server_message(
            ServerMsg::RoomState {
                room_id: "room-1".to_string(),
                players: vec![wire_player(1, Team::Red, 200.0), wire_player(2, Team::Blue, 2800.0)],
                bullets: Vec::new(),
                scores: Scores::default(),
                game_state: GamePhase::Playing,
                winning_team: None,
                game_time_ms: 0.0,
            },
            0,
            &mut cmds,
        );
        (client, cmds)
    }

    #[test]
    fn joining_creates_local_and_remote_players() {
        let (client, _) = joined_client();
        assert!(client.local().is_some());
        assert_eq!(client.remotes().count(), 1);
        assert_eq!(client.game_state, GamePhase::Playing);
    }

    #[test]
    fn every_frame_emits_a_move_message() {
        let (mut client, _) = joined_client();
        client.take_outgoing();

        let mut cmds = CmdVec::new();
        client.update(FRAME_MS, &InputSample::default(), &mut cmds);
        let out = client.take_outgoing();
        assert!(out.iter().any(|m| matches!(m, ClientMsg::Move { .. })));
    }

    #[test]
    fn dash_messages_are_sent_on_edges_only() {
        let (mut client, _) = joined_client();
        client.take_outgoing();
        let mut cmds = CmdVec::new();

        let dashing = InputSample {
            is_dashing: true,
            ..InputSample::default()
        };
        client.update(FRAME_MS, &dashing, &mut cmds);
        client.update(FRAME_MS, &dashing, &mut cmds);
        client.update(FRAME_MS, &InputSample::default(), &mut cmds);

        let dash_msgs: Vec<bool> = client
            .take_outgoing()
            .into_iter()
            .filter_map(|m| match m {
                ClientMsg::Dash { is_dashing } => Some(is_dashing),
                _ => None,
            })
            .collect();
        assert_eq!(dash_msgs, vec![true, false]);
    }

    #[test]
    fn remote_bullet_lifecycle_produces_an_impact() {
        let (mut client, _) = joined_client();
        let id = BulletId {
            owner: PlayerId(2),
            seq: 1,
        };
        let mut cmds = CmdVec::new();
        client.handle_server_message(
            ServerMsg::BulletAdded {
                bullet: BulletState {
                    id,
                    x: 2700.0,
                    y: 480.0,
                    velocity_x: -BULLET_SPEED,
                    owner_id: PlayerId(2),
                    owner_team: Team::Blue,
                },
            },
            0,
            &mut cmds,
        );
        assert_eq!(client.bullets().visuals().count(), 1);
        assert_eq!(
            client.bullets().visuals().next().expect("visual").color_team,
            Team::Blue
        );

        client.handle_server_message(
            ServerMsg::BulletRemoved {
                bullet_id: id,
                x: 2650.0,
            },
            0,
            &mut cmds,
        );
        assert!(cmds.iter().any(|c| matches!(c, RenderCmd::Impact { .. })));
        assert_eq!(client.bullets().visuals().count(), 0);
    }

    #[test]
    fn own_shots_are_pooled_not_tracked() {
        let (mut client, _) = joined_client();
        client.shoot(220.0, 480.0);
        assert!(client
            .take_outgoing()
            .iter()
            .any(|m| matches!(m, ClientMsg::Shoot { .. })));
        assert_eq!(client.bullets().own_pool().len(), 1);

        // The server replicates our bullet back; it must not double up.
        let mut cmds = CmdVec::new();
        client.handle_server_message(
            ServerMsg::BulletAdded {
                bullet: BulletState {
                    id: BulletId {
                        owner: PlayerId(1),
                        seq: 1,
                    },
                    x: 220.0,
                    y: 480.0,
                    velocity_x: BULLET_SPEED,
                    owner_id: PlayerId(1),
                    owner_team: Team::Red,
                },
            },
            0,
            &mut cmds,
        );
        assert_eq!(client.bullets().visuals().count(), 0);
    }

    #[test]
    fn kill_and_match_end_surface_as_render_commands() {
        let (mut client, _) = joined_client();
        let mut cmds = CmdVec::new();
        client.handle_server_message(
            ServerMsg::PlayerKilled {
                killer_id: PlayerId(1),
                victim_id: PlayerId(2),
                killer_name: "p1".to_string(),
                victim_name: "p2".to_string(),
            },
            0,
            &mut cmds,
        );
        client.handle_server_message(
            ServerMsg::MatchEnded {
                winning_team: Team::Red,
                scores: Scores { red: 30, blue: 4 },
            },
            0,
            &mut cmds,
        );

        assert!(cmds.iter().any(|c| matches!(c, RenderCmd::KillFeed { .. })));
        assert!(cmds
            .iter()
            .any(|c| matches!(c, RenderCmd::MatchOver { winning_team: Team::Red, .. })));
        assert_eq!(client.winning_team, Some(Team::Red));
    }

    #[test]
    fn quality_indicators_toggle_per_remote_commands() {
        let (mut client, _) = joined_client();
        let mut cmds = CmdVec::new();
        client.update(FRAME_MS, &InputSample::default(), &mut cmds);
        assert!(!cmds
            .iter()
            .any(|c| matches!(c, RenderCmd::QualityIndicator { .. })));

        client.toggle_quality_indicators();
        cmds.clear();
        client.update(FRAME_MS, &InputSample::default(), &mut cmds);
        assert!(cmds.iter().any(|c| matches!(
            c,
            RenderCmd::QualityIndicator {
                player_id: PlayerId(2),
                band: QualityBand::Green
            }
        )));
    }

    #[test]
    fn leave_tears_everything_down() {
        let (mut client, _) = joined_client();
        client.leave();
        assert!(client.local().is_none());
        assert_eq!(client.remotes().count(), 0);
        assert_eq!(client.bullets().visuals().count(), 0);
        assert!(client.session().local_id().is_none());
        assert!(client
            .take_outgoing()
            .iter()
            .any(|m| matches!(m, ClientMsg::Leave)));
    }
}
