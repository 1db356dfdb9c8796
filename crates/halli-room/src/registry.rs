//! Room registry: creates, finds, lists, and forgets rooms.
//!
//! The registry guards a plain id→handle map with a `std::sync::Mutex`;
//! the lock is held only for map access, never across an await. Room
//! actors call [`RoomRegistry::forget`] on their way out, so the map
//! never holds a handle to a dead actor for long.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use halli_protocol::RoomId;
use halli_session::SessionRegistry;

use crate::room::spawn_room;
use crate::{GameRules, RoomError, RoomHandle, RoomInfo, RoomSettings};

/// Default settings applied when a client enters a room id that does not
/// exist yet (implicit create).
#[derive(Debug, Clone)]
pub struct RoomDefaults {
    pub name: String,
    pub max_players: u8,
    pub fruit_variation: u8,
    pub bell_target: u8,
    pub tempo: crate::Tempo,
}

impl Default for RoomDefaults {
    fn default() -> Self {
        Self {
            name: "Halli Galli".into(),
            max_players: 4,
            fruit_variation: 3,
            bell_target: 5,
            tempo: crate::Tempo::Slow,
        }
    }
}

impl RoomDefaults {
    fn settings(&self) -> RoomSettings {
        RoomSettings {
            name: self.name.clone(),
            max_players: self.max_players,
            fruit_variation: self.fruit_variation,
            bell_target: self.bell_target,
            tempo: self.tempo,
        }
    }
}

/// Tracks every live room.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    sessions: Arc<SessionRegistry>,
    rules: GameRules,
    defaults: RoomDefaults,
    max_rooms: usize,
    /// Fixed seed for room actors in tests; `None` in production.
    seed: Option<u64>,
}

impl RoomRegistry {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        rules: GameRules,
        defaults: RoomDefaults,
        max_rooms: usize,
    ) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            sessions,
            rules,
            defaults,
            max_rooms,
            seed: None,
        }
    }

    /// Makes every room this registry spawns play a deterministic game.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Creates a room with explicit settings and a fresh id
    /// (`1 + highest existing id`). Fails when the room cap is reached.
    pub fn create(
        self: &Arc<Self>,
        settings: RoomSettings,
    ) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.rooms.lock().expect("room registry lock");
        if rooms.len() >= self.max_rooms {
            return Err(RoomError::TooManyRooms);
        }
        let room_id =
            RoomId(rooms.keys().map(|id| id.0).max().unwrap_or(0) + 1);
        let handle = self.spawn(room_id, settings);
        rooms.insert(room_id, handle.clone());
        tracing::info!(room = %room_id, "room created");
        Ok(handle)
    }

    /// Finds the room, or implicitly creates it with default settings
    /// under the requested id. This is the `EnterRoom`-for-an-unknown-id
    /// policy.
    pub fn get_or_create(
        self: &Arc<Self>,
        room_id: RoomId,
    ) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.rooms.lock().expect("room registry lock");
        if let Some(handle) = rooms.get(&room_id) {
            return Ok(handle.clone());
        }
        if rooms.len() >= self.max_rooms {
            return Err(RoomError::TooManyRooms);
        }
        let handle = self.spawn(room_id, self.defaults.settings());
        rooms.insert(room_id, handle.clone());
        tracing::info!(room = %room_id, "room created implicitly on enter");
        Ok(handle)
    }

    pub fn get(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms
            .lock()
            .expect("room registry lock")
            .get(&room_id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.rooms.lock().expect("room registry lock").len()
    }

    /// Lists rooms still in the lobby. Rooms mid-game (or mid-teardown,
    /// which just stop answering) are hidden.
    pub async fn list(&self) -> Vec<RoomInfo> {
        let handles: Vec<RoomHandle> = {
            let rooms = self.rooms.lock().expect("room registry lock");
            rooms.values().cloned().collect()
        };

        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = handle.info().await {
                if info.phase.is_joinable() {
                    infos.push(info);
                }
            }
        }
        infos.sort_by_key(|info| info.room_id.0);
        infos
    }

    /// Drops a room from the map. Called exactly once by each room actor
    /// as it terminates.
    pub(crate) fn forget(&self, room_id: RoomId) {
        if self
            .rooms
            .lock()
            .expect("room registry lock")
            .remove(&room_id)
            .is_some()
        {
            tracing::info!(room = %room_id, "room destroyed");
        }
    }

    fn spawn(self: &Arc<Self>, room_id: RoomId, settings: RoomSettings) -> RoomHandle {
        spawn_room(
            room_id,
            settings,
            self.rules.clone(),
            Arc::clone(&self.sessions),
            Arc::clone(self),
            self.seed,
        )
    }
}
