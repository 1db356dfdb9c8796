//! Unified error type for the server binary.

use halli_protocol::ProtocolError;
use halli_room::RoomError;
use halli_session::AccountError;

/// Top-level error that wraps the layer-specific errors. The `#[from]`
/// attributes let `?` convert them automatically.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("config: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_room_error() {
        let err = RoomError::TooManyRooms;
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Room(_)));
        assert!(server_err.to_string().contains("room limit"));
    }

    #[test]
    fn test_from_account_error() {
        let err = AccountError::AlreadyExists;
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Account(_)));
    }
}
