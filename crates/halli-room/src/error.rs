//! Error types for the room layer.

use halli_protocol::{RoomId, SessionId};

/// Errors that can occur during room operations. Each one reaches the
/// client as a 400 echo of the request that caused it; the variant text
/// is for the server log.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// No free seat left.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The session already sits in a room.
    #[error("session {0} is already in a room")]
    AlreadyInRoom(SessionId),

    /// The session is not a member of this room.
    #[error("session {0} is not in the room")]
    NotInRoom(SessionId),

    /// The seat name is already taken in this room.
    #[error("seat name {0:?} is already taken")]
    NameTaken(String),

    /// The operation needs a running game and there is none.
    #[error("game has not started")]
    GameNotStarted,

    /// The operation is only valid before the game starts.
    #[error("game has already started")]
    GameInProgress,

    /// A slap was already adjudicated against this revealed
    /// configuration.
    #[error("bell already rung this round")]
    BellAlreadyRung,

    /// The process-wide room cap is reached.
    #[error("room limit reached")]
    TooManyRooms,

    /// The room's command channel is gone (actor stopped).
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
