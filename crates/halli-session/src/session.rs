//! Session handle: the server's record of one connected client.
//!
//! A session is created when a websocket connects and destroyed when it
//! drops. It tracks:
//! - HOW to reach the client (the bounded outbound queue the write pump
//!   drains)
//! - WHERE the client is (room membership and seat name)
//! - WHO the client is (the logged-in account, if any)
//!
//! A session is in at most one room at a time.

// `std::sync::Mutex` (not tokio's!) guards the participation fields.
// The distinction matters: a std mutex is held for a few nanoseconds of
// map/field access and never across an `.await`, which makes it both
// faster and safe here. Tokio's async mutex is only needed when a lock
// must survive a suspension point — none of ours do.
use std::sync::Mutex;

use tokio::sync::{mpsc, watch};

use halli_protocol::{ResponseFrame, RoomId, SessionId};

/// Capacity of the per-session outbound queue. A send that finds the
/// queue full drops the session instead of waiting — slow consumers are
/// disconnected, never buffered unboundedly.
pub const OUTBOUND_BUFFER: usize = 256;

/// The receiving ends handed to the connection's write pump.
pub struct SessionChannels {
    /// Encoded frames waiting to go out on the socket.
    pub outbound: mpsc::Receiver<String>,
    /// Flips to `true` exactly once when the session is closed.
    pub closed: watch::Receiver<bool>,
}

/// Mutable participation state, guarded by the session's small lock.
///
/// Why one struct behind one mutex instead of three atomic fields?
/// Because the fields change *together*: taking a seat sets both the
/// room and the seat name, leaving clears both. A reader (say, the
/// registry deciding who gets a room broadcast) must never observe a
/// session with a room id but no seat name. One lock makes the pair
/// atomic.
#[derive(Debug, Default)]
struct Participation {
    room_id: Option<RoomId>,
    seat_name: Option<String>,
    account: Option<LoginRecord>,
}

#[derive(Debug, Clone)]
struct LoginRecord {
    id: String,
    nickname: String,
}

/// One connected client.
///
/// Shared as `Arc<Session>` between the connection tasks, the registry,
/// and the room the client sits in. `Arc` ("atomically reference
/// counted") lets all of them hold the same session cheaply — cloning
/// an `Arc` just bumps a counter, and the session is freed when the
/// last holder drops it.
///
/// The `close` field is a `watch` channel used as a latch:
///
/// ```text
///   close()          write pump              read pump
///     │                  │                      │
///     ├── send(true) ──→ changed() fires ──→ changed() fires
///     │                  │ send Close frame     │ break loop
/// ```
///
/// A `watch` channel always holds exactly one value and wakes every
/// receiver when it changes — receivers that subscribe late still see
/// the latest value, which is what makes `close()` safely idempotent.
///
/// All methods are non-blocking; the inner mutex is never held across
/// an await point.
pub struct Session {
    id: SessionId,
    outbound: mpsc::Sender<String>,
    close: watch::Sender<bool>,
    state: Mutex<Participation>,
}

impl Session {
    pub(crate) fn new(id: SessionId) -> (Self, SessionChannels) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (close_tx, close_rx) = watch::channel(false);
        let session = Self {
            id,
            outbound: outbound_tx,
            close: close_tx,
            state: Mutex::new(Participation::default()),
        };
        let channels = SessionChannels {
            outbound: outbound_rx,
            closed: close_rx,
        };
        (session, channels)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Encodes and enqueues a frame. Returns `false` if the session had
    /// to be dropped: queue full (back-pressure policy) or already
    /// closed. The caller may then evict the session from the registry.
    ///
    /// Note this uses `try_send`, not `send`. The async `send` would
    /// *wait* for queue space, which would let one slow client stall a
    /// room actor mid-broadcast and with it every other player at the
    /// table. `try_send` returns immediately — the slow client is the
    /// one that pays, by being disconnected.
    pub fn send(&self, frame: &ResponseFrame) -> bool {
        match frame.encode() {
            Ok(text) => self.send_text(text),
            Err(err) => {
                tracing::error!(session = %self.id, error = %err, "frame encode failed");
                true
            }
        }
    }

    /// Enqueues pre-encoded frame text. Used by broadcasts so the frame
    /// is encoded once for all recipients.
    pub fn send_text(&self, text: String) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.outbound.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session = %self.id, "outbound queue full, dropping session");
                self.close();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Marks the session closed and wakes its pumps. Idempotent.
    pub fn close(&self) {
        self.close.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.close.borrow()
    }

    // -- participation ----------------------------------------------------

    pub fn room_id(&self) -> Option<RoomId> {
        self.state.lock().expect("session lock").room_id
    }

    pub fn seat_name(&self) -> Option<String> {
        self.state.lock().expect("session lock").seat_name.clone()
    }

    /// Records that this session took a seat in a room. Called by the
    /// room actor while it owns the roster, so membership and fan-out
    /// can never disagree.
    pub fn attach_room(&self, room_id: RoomId, seat_name: String) {
        let mut state = self.state.lock().expect("session lock");
        state.room_id = Some(room_id);
        state.seat_name = Some(seat_name);
    }

    /// Clears room participation (leave, detach, or game end).
    pub fn detach_room(&self) {
        let mut state = self.state.lock().expect("session lock");
        state.room_id = None;
        state.seat_name = None;
    }

    // -- login identity ----------------------------------------------------

    pub fn set_account(&self, id: String, nickname: String) {
        let mut state = self.state.lock().expect("session lock");
        state.account = Some(LoginRecord { id, nickname });
    }

    /// The logged-in nickname, if any. Used as the seat name on join.
    pub fn nickname(&self) -> Option<String> {
        self.state
            .lock()
            .expect("session lock")
            .account
            .as_ref()
            .map(|a| a.nickname.clone())
    }

    pub fn account_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("session lock")
            .account
            .as_ref()
            .map(|a| a.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halli_protocol::ResponseSignal;

    #[test]
    fn test_send_delivers_until_buffer_is_full() {
        let (session, mut channels) = Session::new(SessionId(1));
        let frame = ResponseFrame::ok_empty(ResponseSignal::Pong);

        for _ in 0..OUTBOUND_BUFFER {
            assert!(session.send(&frame));
        }
        // Buffer is full: the next send drops and closes the session.
        assert!(!session.send(&frame));
        assert!(session.is_closed());

        // Everything enqueued before the overflow is still drainable.
        let mut drained = 0;
        while channels.outbound.try_recv().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, OUTBOUND_BUFFER);
    }

    #[test]
    fn test_close_is_idempotent_and_observable() {
        let (session, channels) = Session::new(SessionId(2));
        assert!(!session.is_closed());
        session.close();
        session.close();
        assert!(session.is_closed());
        assert!(*channels.closed.borrow());
    }

    #[test]
    fn test_send_after_close_reports_dropped() {
        let (session, _channels) = Session::new(SessionId(3));
        session.close();
        let frame = ResponseFrame::ok_empty(ResponseSignal::Pong);
        assert!(!session.send(&frame));
    }

    #[test]
    fn test_participation_round_trip() {
        let (session, _channels) = Session::new(SessionId(4));
        assert_eq!(session.room_id(), None);

        session.attach_room(RoomId(9), "Player1234".into());
        assert_eq!(session.room_id(), Some(RoomId(9)));
        assert_eq!(session.seat_name().as_deref(), Some("Player1234"));

        session.detach_room();
        assert_eq!(session.room_id(), None);
        assert_eq!(session.seat_name(), None);
    }

    #[test]
    fn test_account_identity() {
        let (session, _channels) = Session::new(SessionId(5));
        assert_eq!(session.nickname(), None);
        session.set_account("haye".into(), "Haye".into());
        assert_eq!(session.nickname().as_deref(), Some("Haye"));
        assert_eq!(session.account_id().as_deref(), Some("haye"));
    }
}
