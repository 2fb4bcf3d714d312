use std::collections::{HashSet, VecDeque};

use tracing::debug;

use arena_core::{BulletId, GamePhase, PlayerId, Scores, Team};
use arena_protocol::{BulletState, PlayerState, ServerMsg};

/// Typed events derived from the raw server stream. Remote-player creation
/// has exactly one path: `PlayerAdded`. Updates for ids that were never
/// added do not create anything.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    TeamAssigned {
        team: Team,
        player_id: PlayerId,
        room_id: String,
        player_name: String,
    },
    JoinRejected {
        reason: String,
    },
    PlayerAdded(PlayerState),
    PlayerUpdated(PlayerState),
    PlayerRemoved(PlayerId),
    LocalPlayerUpdate(PlayerState),
    BulletAdded(BulletState),
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

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PendingKind {
    Add,
    Update,
}

/// Connection-scoped state: who we are, which remotes exist, and the event
/// queue the coordinator drains. Player events that arrive before
/// `team-assigned` cannot be disambiguated against the local id, so they
/// are buffered and replayed once it lands.
pub struct Session {
    local_id: Option<PlayerId>,
    local_team: Option<Team>,
    room_id: Option<String>,
    known_remotes: HashSet<PlayerId>,
    pending: Vec<(PendingKind, PlayerState)>,
    events: VecDeque<SessionEvent>,
    rtt_ms: Option<u64>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            local_id: None,
            local_team: None,
            room_id: None,
            known_remotes: HashSet::new(),
            pending: Vec::new(),
            events: VecDeque::new(),
            rtt_ms: None,
        }
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    pub fn local_team(&self) -> Option<Team> {
        self.local_team
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn rtt_ms(&self) -> Option<u64> {
        self.rtt_ms
    }

    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    /// Feed one server message; `now_ms` is the shell's monotonic clock,
    /// used only for round-trip measurement.
    pub fn handle_message(&mut self, msg: ServerMsg, now_ms: u64) {
        match msg {
            ServerMsg::TeamAssigned {
                team,
                player_id,
                room_id,
                player_name,
            } => {
                self.local_id = Some(player_id);
                self.local_team = Some(team);
                self.room_id = Some(room_id.clone());
                self.events.push_back(SessionEvent::TeamAssigned {
                    team,
                    player_id,
                    room_id,
                    player_name,
                });
                self.replay_pending();
            }
            ServerMsg::JoinRejected { reason } => {
                self.events.push_back(SessionEvent::JoinRejected { reason });
            }
            ServerMsg::RoomState {
                players,
                bullets,
                scores,
                game_state,
                winning_team,
                ..
            } => {
                for player in players {
                    self.ingest_player(PendingKind::Add, player);
                }
                for bullet in bullets {
                    self.events.push_back(SessionEvent::BulletAdded(bullet));
                }
                self.events.push_back(SessionEvent::StateChanged {
                    game_state,
                    scores,
                    winning_team,
                });
            }
            ServerMsg::PlayerAdded { player } => {
                self.ingest_player(PendingKind::Add, player);
            }
            ServerMsg::PlayerUpdated { player } => {
                self.ingest_player(PendingKind::Update, player);
            }
            ServerMsg::PlayerRemoved { player_id } => {
                if self.known_remotes.remove(&player_id) {
                    self.events.push_back(SessionEvent::PlayerRemoved(player_id));
                }
                self.pending.retain(|(_, p)| p.id != player_id);
            }
            ServerMsg::BulletAdded { bullet } => {
                self.events.push_back(SessionEvent::BulletAdded(bullet));
            }
            ServerMsg::BulletRemoved { bullet_id, x } => {
                self.events
                    .push_back(SessionEvent::BulletRemoved { bullet_id, x });
            }
            ServerMsg::StateChanged {
                game_state,
                scores,
                winning_team,
            } => {
                self.events.push_back(SessionEvent::StateChanged {
                    game_state,
                    scores,
                    winning_team,
                });
            }
            ServerMsg::PlayerKilled {
                killer_id,
                victim_id,
                killer_name,
                victim_name,
            } => {
                self.events.push_back(SessionEvent::PlayerKilled {
                    killer_id,
                    victim_id,
                    killer_name,
                    victim_name,
                });
            }
            ServerMsg::MatchEnded {
                winning_team,
                scores,
            } => {
                self.events.push_back(SessionEvent::MatchEnded {
                    winning_team,
                    scores,
                });
            }
            ServerMsg::Pong { client_time_ms, .. } => {
                self.rtt_ms = Some(now_ms.saturating_sub(client_time_ms));
            }
        }
    }

    fn ingest_player(&mut self, kind: PendingKind, player: PlayerState) {
        let Some(local_id) = self.local_id else {
            // Identity race: cannot tell local from remote yet.
            self.pending.push((kind, player));
            return;
        };
        self.classify(local_id, kind, player);
    }

    fn classify(&mut self, local_id: PlayerId, kind: PendingKind, player: PlayerState) {
        if player.id == local_id {
            self.events
                .push_back(SessionEvent::LocalPlayerUpdate(player));
            return;
        }
        match kind {
            PendingKind::Add => {
                if self.known_remotes.insert(player.id) {
                    self.events.push_back(SessionEvent::PlayerAdded(player));
                } else {
                    self.events.push_back(SessionEvent::PlayerUpdated(player));
                }
            }
            PendingKind::Update => {
                if self.known_remotes.contains(&player.id) {
                    self.events.push_back(SessionEvent::PlayerUpdated(player));
                } else {
                    debug!(
                        player_id = player.id.0,
                        "dropping update for a player never added"
                    );
                }
            }
        }
    }

    fn replay_pending(&mut self) {
        let Some(local_id) = self.local_id else {
            return;
        };
        let pending = std::mem::take(&mut self.pending);
        for (kind, player) in pending {
            self.classify(local_id, kind, player);
        }
    }

    /// Full teardown, used when leaving multiplayer or on transport loss.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_player(id: u64, team: Team) -> PlayerState {
        let (x, y) = team.spawn();
        PlayerState {
            id: PlayerId(id),
            name: format!("p{id}"),
            team,
            x,
            y,
            velocity_x: 0.0,
            velocity_y: 0.0,
            flip_x: false,
            health: 100,
            is_dead: false,
            respawn_timer_ms: 0.0,
            is_dashing: false,
        }
    }

    fn assigned(id: u64) -> ServerMsg {
        ServerMsg::TeamAssigned {
            team: Team::Red,
            player_id: PlayerId(id),
            room_id: "room-1".to_string(),
            player_name: format!("p{id}"),
        }
    }

    fn drain(session: &mut Session) -> Vec<SessionEvent> {
        std::iter::from_fn(|| session.poll_event()).collect()
    }

    #[test]
    fn player_added_before_team_assigned_is_buffered_and_replayed() {
        let mut session = Session::new();

        session.handle_message(
            ServerMsg::PlayerAdded {
                player: wire_player(1, Team::Red),
            },
            0,
        );
        session.handle_message(
            ServerMsg::PlayerAdded {
                player: wire_player(2, Team::Blue),
            },
            0,
        );
        assert!(drain(&mut session).is_empty());

        session.handle_message(assigned(1), 0);
        let events = drain(&mut session);

        assert!(matches!(events[0], SessionEvent::TeamAssigned { player_id, .. } if player_id == PlayerId(1)));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::LocalPlayerUpdate(p) if p.id == PlayerId(1))));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::PlayerAdded(p) if p.id == PlayerId(2))));
        // The local player must never surface as a remote add.
        assert!(!events
            .iter()
            .any(|e| matches!(e, SessionEvent::PlayerAdded(p) if p.id == PlayerId(1))));
    }

    #[test]
    fn update_before_add_does_not_create_a_remote() {
        let mut session = Session::new();
        session.handle_message(assigned(1), 0);
        drain(&mut session);

        session.handle_message(
            ServerMsg::PlayerUpdated {
                player: wire_player(3, Team::Blue),
            },
            0,
        );
        assert!(drain(&mut session).is_empty());

        session.handle_message(
            ServerMsg::PlayerAdded {
                player: wire_player(3, Team::Blue),
            },
            0,
        );
        let events = drain(&mut session);
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::PlayerAdded(p)] if p.id == PlayerId(3)
        ));
    }

    #[test]
    fn room_state_seeds_players_and_bullets() {
        let mut session = Session::new();
        session.handle_message(assigned(1), 0);
        drain(&mut session);

        session.handle_message(
            ServerMsg::RoomState {
                room_id: "room-1".to_string(),
                players: vec![wire_player(1, Team::Red), wire_player(2, Team::Blue)],
                bullets: Vec::new(),
                scores: Scores::default(),
                game_state: GamePhase::Playing,
                winning_team: None,
                game_time_ms: 0.0,
            },
            0,
        );

        let events = drain(&mut session);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::LocalPlayerUpdate(p) if p.id == PlayerId(1))));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::PlayerAdded(p) if p.id == PlayerId(2))));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::StateChanged { game_state, .. } if *game_state == GamePhase::Playing)));
    }

    #[test]
    fn pong_yields_round_trip_time() {
        let mut session = Session::new();
        session.handle_message(
            ServerMsg::Pong {
                client_time_ms: 100,
                server_time_ms: 9999,
            },
            148,
        );
        assert_eq!(session.rtt_ms(), Some(48));
    }
}
