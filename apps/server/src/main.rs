#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod replicate;
mod room;
mod room_manager;
mod sim;

use arena_core::PlayerId;
use arena_protocol::{ClientMsg, ServerMsg};

use crate::config::{ServerConfig, OUTBOUND_CHANNEL_CAPACITY};
use crate::room::RoomHandle;
use crate::room_manager::RoomManager;
use crate::sim::MoveUpdate;

struct AppState {
    room_manager: RoomManager,
    next_player_id: AtomicU64,
    config: ServerConfig,
    started_at: Instant,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState {
        room_manager: RoomManager::new(),
        next_player_id: AtomicU64::new(1),
        config,
        started_at: Instant::now(),
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/rooms", get(list_rooms))
        .with_state(state);

    info!("listening on {bind_addr}");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await
}

async fn list_rooms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.room_manager.list_rooms().await)
}

async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: Arc<AppState>, socket: WebSocket) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_CAPACITY);

    let send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let player_id = PlayerId(state.next_player_id.fetch_add(1, Ordering::Relaxed));
    let mut player_name = format!("player{}", player_id.0);
    let mut current_room: Option<Arc<RoomHandle>> = None;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(client_msg) => {
                    let keep_running = handle_client_msg(
                        &state,
                        &mut current_room,
                        &mut player_name,
                        player_id,
                        client_msg,
                        &tx,
                    )
                    .await;
                    if !keep_running {
                        break;
                    }
                }
                Err(err) => {
                    warn!(player_id = player_id.0, "dropping bad message: {err}");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Transport loss equals leave.
    if current_room.take().is_some() {
        state.room_manager.leave_player(player_id).await;
    }
    send_task.abort();
}

async fn handle_client_msg(
    state: &Arc<AppState>,
    current_room: &mut Option<Arc<RoomHandle>>,
    player_name: &mut String,
    player_id: PlayerId,
    msg: ClientMsg,
    tx: &mpsc::Sender<String>,
) -> bool {
    match msg {
        ClientMsg::Join { name, room } => {
            if current_room.is_some() {
                info!(player_id = player_id.0, "ignoring join while already in a room");
                return true;
            }
            if let Some(name) = name.filter(|n| !n.is_empty()) {
                *player_name = name;
            }
            let room_name = room.unwrap_or_else(|| state.config.default_room.clone());

            match state
                .room_manager
                .join_room(player_id, player_name.clone(), &room_name, tx.clone())
                .await
            {
                Ok((room, ok)) => {
                    let assigned = ServerMsg::TeamAssigned {
                        team: ok.team,
                        player_id,
                        room_id: ok.room_id,
                        player_name: ok.player_name,
                    };
                    if send_msg(tx, &assigned).is_err() || send_msg(tx, &ok.room_state).is_err() {
                        return false;
                    }
                    *current_room = Some(room);
                    true
                }
                Err(err) => {
                    let rejected = ServerMsg::JoinRejected {
                        reason: err.reason().to_string(),
                    };
                    let _ = send_msg(tx, &rejected);
                    true
                }
            }
        }
        ClientMsg::Move {
            seq,
            x,
            y,
            velocity_x,
            velocity_y,
            flip_x,
        } => {
            if let Some(room) = current_room.as_ref() {
                room.forward_move(
                    player_id,
                    MoveUpdate {
                        seq,
                        x,
                        y,
                        velocity_x,
                        velocity_y,
                        flip_x,
                    },
                );
            }
            true
        }
        ClientMsg::Dash { is_dashing } => {
            if let Some(room) = current_room.as_ref() {
                room.forward_dash(player_id, is_dashing);
            }
            true
        }
        ClientMsg::Shoot { x, y } => {
            if let Some(room) = current_room.as_ref() {
                room.forward_shoot(player_id, x, y);
            }
            true
        }
        ClientMsg::Ping { client_time_ms } => {
            let pong = ServerMsg::Pong {
                client_time_ms,
                server_time_ms: state.started_at.elapsed().as_millis() as u64,
            };
            let _ = send_msg(tx, &pong);
            true
        }
        ClientMsg::Leave => {
            if current_room.take().is_some() {
                state.room_manager.leave_player(player_id).await;
            }
            true
        }
    }
}

fn send_msg(tx: &mpsc::Sender<String>, msg: &ServerMsg) -> Result<(), ()> {
    let payload = serde_json::to_string(msg).map_err(|_| ())?;
    tx.try_send(payload).map_err(|_| ())
}
