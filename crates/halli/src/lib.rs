//! # Halli
//!
//! Realtime Halli Galli game server: websocket transport, signal
//! dispatch, rooms, and the credential facade, tied together in one
//! binary.
//!
//! Players connect over a websocket, speak the `{signal, data, code}`
//! frame protocol, gather in rooms, and race to slap the bell when one
//! fruit's face-up total hits the room's target.
//!
//! ```rust,no_run
//! use halli::{HalliServer, ServerConfig};
//! use halli_session::LocalAccountStore;
//!
//! # async fn run() -> Result<(), halli::ServerError> {
//! let config = ServerConfig::default();
//! let server = HalliServer::bind(&config, LocalAccountStore).await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
pub mod logging;
mod server;

pub use config::{GameSection, RoomsSection, ServerConfig};
pub use error::ServerError;
pub use server::HalliServer;

/// Re-exports everything the binary and tests need.
pub mod prelude {
    pub use crate::{HalliServer, ServerConfig, ServerError};

    pub use halli_protocol::{
        decode_request, Request, RequestSignal, ResponseFrame,
        ResponseSignal, RoomId, SessionId, CODE_ERROR, CODE_OK,
    };
    pub use halli_room::{
        GameRules, Phase, RoomDefaults, RoomError, RoomRegistry,
        RoomSettings, Tempo,
    };
    pub use halli_session::{
        AccountStore, LocalAccountStore, Session, SessionRegistry,
        SqlAccountStore,
    };
}
