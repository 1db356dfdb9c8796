//! Room layer for the Halli Galli server.
//!
//! Each room is an isolated tokio task (actor model) owning one game
//! table: roster, seat order, hands, face-up piles, the bell latch, and
//! the two timers (reveal cadence and game time limit). The
//! [`RoomRegistry`] creates, finds, and lists rooms; the pure
//! [`engine::GameState`] holds the card rules with no async in sight.

mod engine;
mod error;
mod registry;
mod room;
mod settings;

pub use engine::{BellVerdict, FaceUp, GameState, Reveal};
pub use error::RoomError;
pub use registry::{RoomDefaults, RoomRegistry};
pub use room::{RoomHandle, RoomInfo};
pub use settings::{GameRules, Phase, RoomSettings, Tempo};
