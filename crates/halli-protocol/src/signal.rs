//! Signal ids: the numeric message identifiers used on the wire.
//!
//! Requests and responses share some ids (1001 EnterRoom is both a request
//! and its reply) but the two directions are distinct closed sets, so they
//! are separate enums. Everything outside this crate matches on the enums;
//! the raw integers appear only in [`RequestSignal::from_wire`] and
//! [`ResponseSignal::wire_id`].

use std::fmt;

/// Result code for a successful response.
pub const CODE_OK: u16 = 200;

/// Result code for a rejected request. The reply echoes the request's
/// signal and carries an empty `data` object; the reason stays in the
/// server log.
pub const CODE_ERROR: u16 = 400;

// ---------------------------------------------------------------------------
// RequestSignal
// ---------------------------------------------------------------------------

/// Every message id a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestSignal {
    Ping,
    EnterRoom,
    LeaveRoom,
    GetRoomList,
    CreateRoom,
    ReadyGame,
    RingBell,
    Emotion,
    CreateAccount,
    Login,
}

impl RequestSignal {
    /// Maps a raw wire id to a request signal. `None` means the frame
    /// fails validation with an unknown-signal error.
    pub fn from_wire(id: u16) -> Option<Self> {
        match id {
            1 => Some(Self::Ping),
            1001 => Some(Self::EnterRoom),
            1002 => Some(Self::LeaveRoom),
            1003 => Some(Self::GetRoomList),
            1004 => Some(Self::CreateRoom),
            1011 => Some(Self::ReadyGame),
            2001 => Some(Self::RingBell),
            2004 => Some(Self::Emotion),
            4000 => Some(Self::CreateAccount),
            4001 => Some(Self::Login),
            _ => None,
        }
    }

    /// The raw id, used when echoing the signal back in an error reply.
    pub fn wire_id(self) -> u16 {
        match self {
            Self::Ping => 1,
            Self::EnterRoom => 1001,
            Self::LeaveRoom => 1002,
            Self::GetRoomList => 1003,
            Self::CreateRoom => 1004,
            Self::ReadyGame => 1011,
            Self::RingBell => 2001,
            Self::Emotion => 2004,
            Self::CreateAccount => 4000,
            Self::Login => 4001,
        }
    }
}

impl fmt::Display for RequestSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.wire_id())
    }
}

// ---------------------------------------------------------------------------
// ResponseSignal
// ---------------------------------------------------------------------------

/// Every message id the server may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseSignal {
    Pong,
    EnterRoom,
    LeaveRoom,
    RoomList,
    CreateRoom,
    PlayerCountChanged,
    StartGame,
    ReadyGame,
    OpenCard,
    BellCorrect,
    BellWrong,
    Emotion,
    EndGame,
    CreateAccount,
    Login,
}

impl ResponseSignal {
    pub fn wire_id(self) -> u16 {
        match self {
            Self::Pong => 1,
            Self::EnterRoom => 1001,
            Self::LeaveRoom => 1002,
            Self::RoomList => 1003,
            Self::CreateRoom => 1004,
            Self::PlayerCountChanged => 1005,
            Self::StartGame => 1010,
            Self::ReadyGame => 1011,
            Self::OpenCard => 2000,
            Self::BellCorrect => 2002,
            Self::BellWrong => 2003,
            Self::Emotion => 2004,
            Self::EndGame => 3000,
            Self::CreateAccount => 4000,
            Self::Login => 4001,
        }
    }
}

impl fmt::Display for ResponseSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.wire_id())
    }
}
