//! Registry of live rooms and join-or-create for two-slot rooms

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::room::{GameRoom, JoinAck, RoomError, RoomHandle};

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.remove(id).map(|(_, h)| h)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// Find a room with a free slot
    pub fn find_available_room(&self) -> Option<RoomHandle> {
        self.rooms
            .iter()
            .find(|entry| entry.value().is_accepting())
            .map(|entry| entry.value().clone())
    }

    /// Spawn a new room task; it deregisters itself when it exits
    pub fn create_room(self: &Arc<Self>) -> RoomHandle {
        let id = Uuid::new_v4();
        let (room, handle) = GameRoom::new(id);
        self.rooms.insert(id, handle.clone());

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            room.run().await;
            registry.remove(&id);
        });

        info!(room_id = %id, active_rooms = self.active_rooms(), "Room created");
        handle
    }

    /// Join the first room with a free slot, creating one if none is open
    pub async fn join_or_create(
        self: &Arc<Self>,
        session_id: &str,
    ) -> Result<(RoomHandle, JoinAck), RoomError> {
        if let Some(handle) = self.find_available_room() {
            match handle.join(session_id).await {
                Ok(ack) => return Ok((handle, ack)),
                // Filled or closed between the lookup and the join
                Err(RoomError::RoomFull | RoomError::RoomClosed | RoomError::MatchFinished) => {}
                Err(e) => return Err(e),
            }
            warn!(room_id = %handle.id, session_id = %session_id, "Room no longer available, creating another");
        }

        let handle = self.create_room();
        let ack = handle.join(session_id).await?;
        Ok((handle, ack))
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MatchPhase;
    use std::time::Duration;
    use tokio_test::assert_ok;

    #[tokio::test(start_paused = true)]
    async fn pairs_sessions_two_per_room() {
        let registry = Arc::new(RoomRegistry::new());

        let (room_a, ack_a) = assert_ok!(registry.join_or_create("a").await);
        let (room_b, ack_b) = assert_ok!(registry.join_or_create("b").await);
        let (room_c, ack_c) = assert_ok!(registry.join_or_create("c").await);

        assert_eq!(room_a.id, room_b.id);
        assert_ne!(room_a.id, room_c.id);
        assert_eq!((ack_a.slot, ack_b.slot, ack_c.slot), (0, 1, 0));
        assert_eq!(ack_b.state.room.phase, MatchPhase::Countdown);
        assert_eq!(registry.active_rooms(), 2);
        assert_eq!(registry.total_players(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_rooms_are_dropped() {
        let registry = Arc::new(RoomRegistry::new());
        let (room, _) = assert_ok!(registry.join_or_create("a").await);
        room.leave("a").await;

        for _ in 0..100 {
            if registry.active_rooms() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.active_rooms(), 0);
        assert!(registry.get(&room.id).is_none());
    }
}
