//! Identity newtypes shared across the server.
//!
//! Wrapping the raw integers stops a `RoomId` from being passed where a
//! `SessionId` is expected; the payload structs unwrap them back to plain
//! numbers at the wire boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A unique identifier for one connected client, monotone within the
/// process and never reused.
///
/// This is a "newtype wrapper" — a common Rust pattern where you wrap a
/// primitive type (here `u64`) in a named struct. Why bother?
///
/// 1. **Type safety**: You can't accidentally pass a `RoomId` where a
///    `SessionId` is expected, even though both are integers underneath.
/// 2. **Readability**: Function signatures like `fn leave(id: SessionId)`
///    are clearer than `fn leave(id: u64)`.
///
/// The `#[derive(...)]` attribute auto-generates trait implementations:
///   - `Debug`       → enables `{:?}` formatting for logging
///   - `Clone, Copy` → allows cheap duplication (it's just a u64)
///   - `PartialEq, Eq` → enables `==` comparison
///   - `Hash`        → enables use as a HashMap key
///   - `Serialize, Deserialize` → enables JSON conversion
///
/// The `#[serde(transparent)]` attribute tells serde to serialize this as
/// just the inner `u64`, not as `{ "0": 42 }`. So a SessionId(42) becomes
/// just `42` in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

/// Display lets us use `{}` in format strings and logging.
/// `tracing::info!("session {} joined", id)` will print "session S-42 joined".
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A unique identifier for a room (one game table).
///
/// Same newtype pattern as `SessionId`. A room is one instance of a
/// game — one table of players racing for the bell. Always > 0 on the
/// wire; ids may be reused after a room is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}
