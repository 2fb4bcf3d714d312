use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use arena_core::PlayerId;
use arena_protocol::RoomMetadata;

use crate::room::{JoinError, JoinOk, RoomHandle, RoomId};

#[derive(Default)]
pub struct RoomMetrics {
    pub rooms_created_total: AtomicU64,
    pub players_joined_total: AtomicU64,
    pub players_left_total: AtomicU64,
}

/// Lobby view of one room.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub name: String,
    pub metadata: RoomMetadata,
}

pub struct RoomManager {
    rooms: RwLock<HashMap<RoomId, Arc<RoomHandle>>>,
    names: RwLock<HashMap<String, RoomId>>,
    player_rooms: Mutex<HashMap<PlayerId, RoomId>>,
    pub metrics: RoomMetrics,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
            player_rooms: Mutex::new(HashMap::new()),
            metrics: RoomMetrics::default(),
        }
    }

    pub async fn get_or_create_room(&self, name: &str) -> Arc<RoomHandle> {
        let mut rooms = self.rooms.write().await;
        let mut names = self.names.write().await;

        if let Some(room_id) = names.get(name) {
            if let Some(room) = rooms.get(room_id) {
                return Arc::clone(room);
            }
            names.remove(name);
        }

        let room_id = RoomId::from(Uuid::new_v4().simple().to_string());
        let room = RoomHandle::new(room_id.clone(), name.to_string());
        rooms.insert(room_id.clone(), Arc::clone(&room));
        names.insert(name.to_string(), room_id.clone());
        self.metrics
            .rooms_created_total
            .fetch_add(1, Ordering::Relaxed);
        info!(room_id = room_id.as_str(), name, "room created");
        room
    }

    pub async fn join_room(
        &self,
        player_id: PlayerId,
        player_name: String,
        room_name: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<(Arc<RoomHandle>, JoinOk), JoinError> {
        self.leave_player(player_id).await;

        // One retry when the cached room already shut down: recreate under
        // the same name and join the fresh one.
        for _ in 0..2 {
            let room = self.get_or_create_room(room_name).await;
            match room.join(player_id, player_name.clone(), tx.clone()).await {
                Ok(ok) => {
                    self.player_rooms
                        .lock()
                        .await
                        .insert(player_id, room.id().clone());
                    self.metrics
                        .players_joined_total
                        .fetch_add(1, Ordering::Relaxed);
                    return Ok((room, ok));
                }
                Err(JoinError::RoomClosing) => {
                    self.forget_room(room.id()).await;
                }
                Err(err) => return Err(err),
            }
        }
        Err(JoinError::RoomClosing)
    }

    pub async fn leave_player(&self, player_id: PlayerId) {
        if let Some(room_id) = self.player_rooms.lock().await.remove(&player_id) {
            if let Some(room) = self.rooms.read().await.get(&room_id).cloned() {
                room.leave(player_id);
                self.metrics
                    .players_left_total
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn forget_room(&self, room_id: &RoomId) {
        let mut rooms = self.rooms.write().await;
        let mut names = self.names.write().await;
        rooms.remove(room_id);
        names.retain(|_, id| id != room_id);
        self.player_rooms
            .lock()
            .await
            .retain(|_, mapped| mapped != room_id);
    }

    /// Lobby listing; rooms whose task already ended are pruned as a side
    /// effect of answering with nothing.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let handles: Vec<Arc<RoomHandle>> = self.rooms.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for room in handles {
            match room.metadata().await {
                Some(metadata) => summaries.push(RoomSummary {
                    room_id: room.id().as_str().to_string(),
                    name: room.name().to_string(),
                    metadata,
                }),
                None => self.forget_room(room.id()).await,
            }
        }

        summaries.sort_by(|a, b| {
            (b.metadata.red_count + b.metadata.blue_count)
                .cmp(&(a.metadata.red_count + a.metadata.blue_count))
                .then_with(|| a.name.cmp(&b.name))
        });
        summaries
    }

    pub async fn current_players(&self) -> usize {
        self.player_rooms.lock().await.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OUTBOUND_CHANNEL_CAPACITY;

    fn client() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(OUTBOUND_CHANNEL_CAPACITY)
    }

    #[tokio::test]
    async fn get_or_create_reuses_the_same_room() {
        let manager = RoomManager::new();
        let a = manager.get_or_create_room("alpha").await;
        let b = manager.get_or_create_room("alpha").await;
        assert_eq!(a.id(), b.id());
        assert_eq!(
            manager.metrics.rooms_created_total.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn lobby_lists_rooms_with_metadata() {
        let manager = RoomManager::new();
        let (tx, _rx) = client();
        manager
            .join_room(PlayerId(1), "p1".to_string(), "beta", tx)
            .await
            .expect("join");

        let rooms = manager.list_rooms().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "beta");
        assert_eq!(rooms[0].metadata.red_count, 1);
    }

    #[tokio::test]
    async fn leave_clears_membership() {
        let manager = RoomManager::new();
        let (tx, _rx) = client();
        manager
            .join_room(PlayerId(5), "p5".to_string(), "gamma", tx)
            .await
            .expect("join");
        assert_eq!(manager.current_players().await, 1);

        manager.leave_player(PlayerId(5)).await;
        assert_eq!(manager.current_players().await, 0);
    }

    #[tokio::test]
    async fn rejoining_a_closed_room_name_creates_a_fresh_room() {
        let manager = RoomManager::new();
        let (tx, _rx) = client();
        let (room, _) = manager
            .join_room(PlayerId(1), "p1".to_string(), "delta", tx)
            .await
            .expect("join");
        let first_id = room.id().clone();

        manager.leave_player(PlayerId(1)).await;
        tokio::task::yield_now().await;

        let (tx2, _rx2) = client();
        let (room2, ok) = manager
            .join_room(PlayerId(2), "p2".to_string(), "delta", tx2)
            .await
            .expect("rejoin");
        assert_ne!(room2.id(), &first_id);
        assert_eq!(ok.room_id, room2.id().as_str());
    }

    #[tokio::test]
    async fn switching_rooms_leaves_the_old_one() {
        let manager = RoomManager::new();
        let (tx_a, _rx_a) = client();
        let (tx_keep, _rx_keep) = client();

        // Second member keeps room "a" alive after the switcher leaves.
        manager
            .join_room(PlayerId(7), "keeper".to_string(), "a", tx_keep)
            .await
            .expect("keeper join");
        manager
            .join_room(PlayerId(8), "drifter".to_string(), "a", tx_a)
            .await
            .expect("drifter join a");

        let (tx_b, _rx_b) = client();
        manager
            .join_room(PlayerId(8), "drifter".to_string(), "b", tx_b)
            .await
            .expect("drifter join b");

        let rooms = manager.list_rooms().await;
        let room_a = rooms.iter().find(|r| r.name == "a").expect("room a");
        let room_b = rooms.iter().find(|r| r.name == "b").expect("room b");
        assert_eq!(room_a.metadata.red_count + room_a.metadata.blue_count, 1);
        assert_eq!(room_b.metadata.red_count + room_b.metadata.blue_count, 1);
    }
}
