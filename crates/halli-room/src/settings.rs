//! Room settings, tempo, phase state machine, and process-wide game rules.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Tempo
// ---------------------------------------------------------------------------

/// Reveal cadence. The wire carries it as `speed` 0–3; internally it is a
/// closed enum so an out-of-range value cannot exist past the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tempo {
    /// 3 seconds between reveals.
    Slow,
    /// 2 seconds.
    Medium,
    /// 1.5 seconds.
    Fast,
    /// 1 second.
    Turbo,
}

impl Tempo {
    pub fn from_wire(speed: u8) -> Option<Self> {
        match speed {
            0 => Some(Self::Slow),
            1 => Some(Self::Medium),
            2 => Some(Self::Fast),
            3 => Some(Self::Turbo),
            _ => None,
        }
    }

    pub fn wire_id(self) -> u8 {
        match self {
            Self::Slow => 0,
            Self::Medium => 1,
            Self::Fast => 2,
            Self::Turbo => 3,
        }
    }

    /// The reveal interval this tempo maps to.
    pub fn interval(self) -> Duration {
        match self {
            Self::Slow => Duration::from_secs(3),
            Self::Medium => Duration::from_secs(2),
            Self::Fast => Duration::from_millis(1500),
            Self::Turbo => Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// Per-room configuration, fixed at creation time.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub name: String,
    pub max_players: u8,
    /// Number of distinct fruit kinds in play.
    pub fruit_variation: u8,
    /// The face-up total of one fruit that makes a slap correct.
    pub bell_target: u8,
    pub tempo: Tempo,
}

/// Process-wide game constants shared by every room.
#[derive(Debug, Clone)]
pub struct GameRules {
    /// Cards dealt to each seat at game start.
    pub starting_cards: u32,
    /// After this much play time the next correct bell ends the game.
    pub game_time_limit: Duration,
    /// Minimum spacing between emotion broadcasts per session.
    pub emotion_cooldown: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            starting_cards: 5,
            game_time_limit: Duration::from_secs(120),
            emotion_cooldown: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// ```text
/// Lobby → Starting → Playing → Ended
/// ```
///
/// - **Lobby**: accepting joins and leaves.
/// - **Starting**: roster is full, seat order fixed, waiting for every
///   seat to send ReadyGame.
/// - **Playing**: the reveal loop is running.
/// - **Ended**: terminal; the room is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Starting,
    Playing,
    Ended,
}

impl Phase {
    /// Whether new players may take a seat.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Whether a game identity (seat order) exists.
    pub fn is_started(self) -> bool {
        matches!(self, Self::Starting | Self::Playing)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::Starting => write!(f, "Starting"),
            Self::Playing => write!(f, "Playing"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}
