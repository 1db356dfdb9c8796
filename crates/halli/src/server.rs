//! The accept loop and shared server state.
//!
//! This is the entry point for running the game server. It ties the
//! layers together: transport (websocket) → protocol (frames) →
//! session → room.

use std::sync::Arc;

use tokio::net::TcpListener;

use halli_room::RoomRegistry;
use halli_session::{AccountStore, SessionRegistry};

use crate::handler::handle_connection;
use crate::{ServerConfig, ServerError};

/// State shared by every connection task.
///
/// Wrapped in `Arc` so each spawned connection handler can cheaply
/// clone a reference to it. The generic `A` is the account store
/// implementation — the server is monomorphized once for local mode and
/// once for the SQL store, so there is no dynamic dispatch on the login
/// path.
pub(crate) struct AppState<A: AccountStore> {
    pub(crate) sessions: Arc<SessionRegistry>,
    pub(crate) rooms: Arc<RoomRegistry>,
    pub(crate) accounts: A,
    /// Configured bounds on a room's `maxPlayerCount`.
    pub(crate) player_range: std::ops::RangeInclusive<u8>,
}

/// A bound, ready-to-run game server.
pub struct HalliServer<A: AccountStore> {
    listener: TcpListener,
    state: Arc<AppState<A>>,
}

impl<A: AccountStore> HalliServer<A> {
    /// Binds the listener and wires up the registries.
    pub async fn bind(
        config: &ServerConfig,
        accounts: A,
    ) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(("0.0.0.0", config.port)).await?;

        let sessions = Arc::new(SessionRegistry::new());
        let rooms = Arc::new(RoomRegistry::new(
            Arc::clone(&sessions),
            config.game_rules(),
            config.room_defaults(),
            config.rooms.max_rooms,
        ));

        tracing::info!(
            addr = %listener.local_addr()?,
            use_database = config.use_database,
            "listening"
        );

        Ok(Self {
            listener,
            state: Arc::new(AppState {
                sessions,
                rooms,
                accounts,
                player_range: config.rooms.min_players
                    ..=config.rooms.max_players,
            }),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the process is terminated. Each
    /// connection gets its own task; a failed accept is logged and the
    /// loop keeps going.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(err) =
                            handle_connection(stream, peer, state).await
                        {
                            tracing::debug!(
                                %peer,
                                error = %err,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(err) => {
                    tracing::error!(error = %err, "accept failed");
                }
            }
        }
    }
}
