//! Wire protocol for the Halli Galli server.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Signals** ([`RequestSignal`], [`ResponseSignal`]) — the numeric
//!   message ids used on the wire. The integers live only at this
//!   boundary; the rest of the server works with the typed enums.
//! - **Frames** ([`RequestFrame`], [`ResponseFrame`]) — the
//!   `{signal, data, code}` envelope every message travels in.
//! - **Payloads** — the typed `data` objects for each signal.
//! - **Codec** ([`decode_request`]) — validation and classification of
//!   inbound bytes into a [`Request`].
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the session
//! layer (player identity). It doesn't know about connections or rooms —
//! it only knows how to parse, validate, and render messages.
//!
//! ```text
//! Transport (bytes) → Protocol (Request / ResponseFrame) → Session / Room
//! ```

mod codec;
mod error;
mod ids;
mod signal;
mod types;

pub use codec::{decode_request, DecodeFailure, Request};
pub use error::ProtocolError;
pub use ids::{RoomId, SessionId};
pub use signal::{RequestSignal, ResponseSignal, CODE_ERROR, CODE_OK};
pub use types::{
    BellCorrectData, BellWrongData, CreateAccountData, CreateAccountRequest,
    CreateRoomData, CreateRoomRequest, EmotionData, EmotionRequest,
    EndGameData, EnterRoomData, EnterRoomRequest, HelloData, LoginData,
    LoginRequest, OpenCardData, PlayerCountChangedData, PongData,
    RequestFrame, ResponseFrame, RoomListData, RoomSummary, StartGameData,
};
