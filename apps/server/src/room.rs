use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, sleep, Instant};
use tracing::{debug, info, warn};

use arena_core::constants::{BULLET_LIFETIME_MS, MAX_CLIENTS, TICK_MILLIS};
use arena_core::{pick_team, BulletId, PlayerId, Team};
use arena_protocol::{RoomMetadata, ServerMsg};

use crate::config::ROOM_COMMAND_CAPACITY;
use crate::replicate::{room_state_wire, Replicator};
use crate::sim::{self, EventVec, MoveUpdate, Player, RoomState, SimEvent};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RoomId(pub Arc<str>);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinError {
    RoomFull,
    RoomClosing,
}

impl JoinError {
    pub fn reason(self) -> &'static str {
        match self {
            Self::RoomFull => "room_full",
            Self::RoomClosing => "room_closing",
        }
    }
}

/// Everything the session layer needs to answer a successful join.
#[derive(Debug)]
pub struct JoinOk {
    pub team: Team,
    pub player_name: String,
    pub room_id: String,
    pub room_state: ServerMsg,
}

enum RoomCmd {
    Join {
        player_id: PlayerId,
        name: String,
        tx: mpsc::Sender<String>,
        respond: oneshot::Sender<Result<JoinOk, JoinError>>,
    },
    Leave {
        player_id: PlayerId,
    },
    Move {
        player_id: PlayerId,
        mv: MoveUpdate,
    },
    Dash {
        player_id: PlayerId,
        is_dashing: bool,
    },
    Shoot {
        player_id: PlayerId,
        x: f32,
        y: f32,
    },
    ExpireBullet {
        id: BulletId,
    },
    Metadata {
        respond: oneshot::Sender<RoomMetadata>,
    },
    #[cfg(test)]
    Inspect {
        respond: oneshot::Sender<InspectReport>,
    },
}

#[cfg(test)]
pub struct InspectReport {
    pub players: Vec<arena_protocol::PlayerState>,
    pub phase: arena_core::GamePhase,
    pub scores: arena_core::Scores,
    pub bullet_count: usize,
}

pub struct RoomHandle {
    id: RoomId,
    name: String,
    tx: mpsc::Sender<RoomCmd>,
}

impl RoomHandle {
    pub fn new(id: RoomId, name: String) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(ROOM_COMMAND_CAPACITY);
        let handle = Arc::new(Self {
            id,
            name,
            tx: tx.clone(),
        });

        let task_handle = Arc::clone(&handle);
        tokio::spawn(async move {
            let mut task = RoomTask::new(task_handle.id.clone(), rx, tx);
            task.run().await;
        });

        handle
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        tx: mpsc::Sender<String>,
    ) -> Result<JoinOk, JoinError> {
        let (respond, response_rx) = oneshot::channel();
        let cmd = RoomCmd::Join {
            player_id,
            name,
            tx,
            respond,
        };
        if self.tx.send(cmd).await.is_err() {
            return Err(JoinError::RoomClosing);
        }
        response_rx.await.unwrap_or(Err(JoinError::RoomClosing))
    }

    pub fn leave(&self, player_id: PlayerId) {
        let _ = self.tx.try_send(RoomCmd::Leave { player_id });
    }

    pub fn forward_move(&self, player_id: PlayerId, mv: MoveUpdate) {
        let _ = self.tx.try_send(RoomCmd::Move { player_id, mv });
    }

    pub fn forward_dash(&self, player_id: PlayerId, is_dashing: bool) {
        let _ = self.tx.try_send(RoomCmd::Dash {
            player_id,
            is_dashing,
        });
    }

    pub fn forward_shoot(&self, player_id: PlayerId, x: f32, y: f32) {
        let _ = self.tx.try_send(RoomCmd::Shoot { player_id, x, y });
    }

    pub async fn metadata(&self) -> Option<RoomMetadata> {
        let (respond, rx) = oneshot::channel();
        if self.tx.send(RoomCmd::Metadata { respond }).await.is_err() {
            return None;
        }
        rx.await.ok()
    }

    #[cfg(test)]
    pub async fn inspect(&self) -> Option<InspectReport> {
        let (respond, rx) = oneshot::channel();
        if self.tx.send(RoomCmd::Inspect { respond }).await.is_err() {
            return None;
        }
        rx.await.ok()
    }
}

struct RoomTask {
    room_id: RoomId,
    rx: mpsc::Receiver<RoomCmd>,
    cmd_tx: mpsc::Sender<RoomCmd>,
    state: RoomState,
    conns: HashMap<PlayerId, mpsc::Sender<String>>,
    replicator: Replicator,
    metadata: RoomMetadata,
    last_tick: Instant,
    had_players: bool,
    closing: bool,
    scratch_events: EventVec,
    scratch_diffs: Vec<ServerMsg>,
    scratch_disconnected: Vec<PlayerId>,
}

impl RoomTask {
    fn new(room_id: RoomId, rx: mpsc::Receiver<RoomCmd>, cmd_tx: mpsc::Sender<RoomCmd>) -> Self {
        Self {
            room_id,
            rx,
            cmd_tx,
            state: RoomState::new(),
            conns: HashMap::new(),
            replicator: Replicator::new(),
            metadata: RoomMetadata::default(),
            last_tick: Instant::now(),
            had_players: false,
            closing: false,
            scratch_events: EventVec::new(),
            scratch_diffs: Vec::new(),
            scratch_disconnected: Vec::new(),
        }
    }

    async fn run(&mut self) {
        let mut tick_interval = interval(Duration::from_millis(TICK_MILLIS));
        self.last_tick = Instant::now();
        loop {
            tokio::select! {
                maybe_cmd = self.rx.recv() => {
                    let Some(cmd) = maybe_cmd else {
                        break;
                    };
                    self.handle_cmd(cmd);
                }
                _ = tick_interval.tick() => {
                    self.tick();
                }
            }
            if self.closing {
                break;
            }
        }
        info!(room_id = self.room_id.as_str(), "room closed");
    }

    fn handle_cmd(&mut self, cmd: RoomCmd) {
        match cmd {
            RoomCmd::Join {
                player_id,
                name,
                tx,
                respond,
            } => {
                let result = self.handle_join(player_id, name, tx);
                let _ = respond.send(result);
            }
            RoomCmd::Leave { player_id } => {
                self.remove_player(player_id);
            }
            RoomCmd::Move { player_id, mv } => {
                sim::apply_move(&mut self.state, player_id, &mv);
            }
            RoomCmd::Dash {
                player_id,
                is_dashing,
            } => {
                sim::apply_dash(&mut self.state, player_id, is_dashing);
            }
            RoomCmd::Shoot { player_id, x, y } => {
                if let Some(bullet) = sim::handle_shoot(&mut self.state, player_id, x, y) {
                    self.schedule_expiry(bullet.id);
                }
            }
            RoomCmd::ExpireBullet { id } => {
                sim::expire_bullet(&mut self.state, id);
            }
            RoomCmd::Metadata { respond } => {
                let _ = respond.send(self.metadata);
            }
            #[cfg(test)]
            RoomCmd::Inspect { respond } => {
                let _ = respond.send(InspectReport {
                    players: self
                        .state
                        .players
                        .values()
                        .map(crate::replicate::player_wire)
                        .collect(),
                    phase: self.state.phase,
                    scores: self.state.scores,
                    bullet_count: self.state.bullets.len(),
                });
            }
        }
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        name: String,
        tx: mpsc::Sender<String>,
    ) -> Result<JoinOk, JoinError> {
        if self.closing {
            return Err(JoinError::RoomClosing);
        }
        if self.conns.len() >= MAX_CLIENTS && !self.conns.contains_key(&player_id) {
            return Err(JoinError::RoomFull);
        }

        let team = if let Some(existing) = self.state.players.get(&player_id) {
            // Reconnect: refresh the outbound channel, keep the player.
            existing.team
        } else {
            let team = pick_team(
                self.state.live_count(Team::Red),
                self.state.live_count(Team::Blue),
            );
            self.state
                .players
                .insert(player_id, Player::new(player_id, name.clone(), team));
            team
        };
        self.conns.insert(player_id, tx);
        self.had_players = true;
        self.state.start_if_waiting();
        self.refresh_metadata();
        info!(
            player_id = player_id.0,
            room_id = self.room_id.as_str(),
            team = team.as_str(),
            "player joined"
        );

        Ok(JoinOk {
            team,
            player_name: name,
            room_id: self.room_id.as_str().to_string(),
            room_state: room_state_wire(self.room_id.as_str(), &self.state),
        })
    }

    fn remove_player(&mut self, player_id: PlayerId) {
        if self.state.players.remove(&player_id).is_some() {
            self.conns.remove(&player_id);
            self.refresh_metadata();
            debug!(
                player_id = player_id.0,
                room_id = self.room_id.as_str(),
                "player left"
            );
        }
        if self.had_players && self.conns.is_empty() {
            self.closing = true;
        }
    }

    fn schedule_expiry(&self, id: BulletId) {
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(BULLET_LIFETIME_MS)).await;
            let _ = tx.send(RoomCmd::ExpireBullet { id }).await;
        });
    }

    fn refresh_metadata(&mut self) {
        self.metadata = RoomMetadata {
            red_count: self.state.member_count(Team::Red),
            blue_count: self.state.member_count(Team::Blue),
            game_state: self.state.phase,
        };
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let dt_ms = now.duration_since(self.last_tick).as_secs_f64() * 1000.0;
        self.last_tick = now;

        let phase_before = self.state.phase;
        let mut events = std::mem::take(&mut self.scratch_events);
        events.clear();
        sim::simulate_tick(&mut self.state, dt_ms, &mut events);
        for event in events.drain(..) {
            let msg = match event {
                SimEvent::PlayerKilled {
                    killer_id,
                    victim_id,
                    killer_name,
                    victim_name,
                } => ServerMsg::PlayerKilled {
                    killer_id,
                    victim_id,
                    killer_name,
                    victim_name,
                },
                SimEvent::MatchEnded {
                    winning_team,
                    scores,
                } => ServerMsg::MatchEnded {
                    winning_team,
                    scores,
                },
            };
            self.broadcast(&msg);
        }
        self.scratch_events = events;

        let mut diffs = std::mem::take(&mut self.scratch_diffs);
        diffs.clear();
        self.replicator.diff(&self.state, &mut diffs);
        for msg in &diffs {
            self.broadcast(msg);
        }
        diffs.clear();
        self.scratch_diffs = diffs;

        if self.state.phase != phase_before {
            self.refresh_metadata();
        }
    }

    fn broadcast(&mut self, msg: &ServerMsg) {
        let payload = match serde_json::to_string(msg) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    room_id = self.room_id.as_str(),
                    "dropping unencodable broadcast: {err}"
                );
                return;
            }
        };

        self.scratch_disconnected.clear();
        for (player_id, tx) in &self.conns {
            match tx.try_send(payload.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        player_id = player_id.0,
                        room_id = self.room_id.as_str(),
                        "dropping slow client: outbound channel full"
                    );
                    self.scratch_disconnected.push(*player_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(
                        player_id = player_id.0,
                        room_id = self.room_id.as_str(),
                        "removing disconnected client: outbound channel closed"
                    );
                    self.scratch_disconnected.push(*player_id);
                }
            }
        }

        while let Some(player_id) = self.scratch_disconnected.pop() {
            self.remove_player(player_id);
        }
    }
}
