//! The session registry: the set of live sessions and its fan-outs.
//!
//! # Concurrency note
//!
//! The registry guards a plain `HashMap` with a `std::sync::Mutex`. The
//! lock is held only for map access and recipient snapshots — encoding
//! happens before the lock, queueing after it — so it is never held
//! across an await point. Lock order when a room is also involved:
//! registry first, then the room, never the reverse.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use halli_protocol::{ResponseFrame, RoomId, SessionId};

use crate::{Session, SessionChannels};

/// Tracks every live session and delivers frames to them.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates and registers a session for a new connection, returning
    /// the shared handle and the channel ends for the write pump.
    pub fn register(&self) -> (Arc<Session>, SessionChannels) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (session, channels) = Session::new(id);
        let session = Arc::new(session);
        self.sessions
            .lock()
            .expect("registry lock")
            .insert(id, Arc::clone(&session));
        tracing::info!(session = %id, "session registered");
        (session, channels)
    }

    /// Removes a session from the registry and closes it. Safe to call
    /// more than once; later calls are no-ops.
    pub fn unregister(&self, id: SessionId) {
        let removed = self.sessions.lock().expect("registry lock").remove(&id);
        if let Some(session) = removed {
            session.close();
            tracing::info!(session = %id, "session unregistered");
        }
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().expect("registry lock").get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().expect("registry lock").len()
    }

    /// Sends a frame to every live session.
    pub fn broadcast_to_all(&self, frame: &ResponseFrame) {
        self.fan_out(frame, |_| true);
    }

    /// Sends a frame to every session currently seated in `room_id`.
    /// Detached seats have no participation entry, so they are skipped
    /// naturally.
    pub fn broadcast_to_room(&self, room_id: RoomId, frame: &ResponseFrame) {
        self.fan_out(frame, |s| s.room_id() == Some(room_id));
    }

    /// Shared fan-out: encode once, snapshot recipients under the lock,
    /// queue outside it. Destinations whose buffer is full are closed
    /// and evicted.
    fn fan_out<F: Fn(&Session) -> bool>(&self, frame: &ResponseFrame, want: F) {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "broadcast encode failed");
                return;
            }
        };

        let recipients: Vec<Arc<Session>> = {
            let sessions = self.sessions.lock().expect("registry lock");
            sessions.values().cloned().collect()
        };

        let mut evicted = Vec::new();
        for session in recipients {
            if !want(&session) {
                continue;
            }
            if !session.send_text(text.clone()) {
                evicted.push(session.id());
            }
        }
        for id in evicted {
            self.unregister(id);
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
