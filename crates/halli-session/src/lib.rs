//! Session layer for the Halli Galli server.
//!
//! This crate tracks who is connected and how to reach them:
//!
//! 1. **Sessions** ([`Session`]) — one record per live websocket, holding
//!    the bounded outbound queue and the client's participation state
//!    (which room, which seat name, which account).
//! 2. **Registry** ([`SessionRegistry`]) — the live-session set with
//!    register/unregister and the two fan-outs (all sessions, one room).
//! 3. **Accounts** ([`AccountStore`]) — the credential facade, either
//!    backed by SQLite or running in local mode with no persistence.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)   ← fans events out to member sessions
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol layer (below) ← provides SessionId, frames
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;
mod session;

pub use auth::{AccountStore, LocalAccountStore, LoginIdentity, SqlAccountStore};
pub use error::AccountError;
pub use registry::SessionRegistry;
pub use session::{Session, SessionChannels, OUTBOUND_BUFFER};
