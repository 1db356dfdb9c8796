//! Inbound frame validation and classification.
//!
//! [`decode_request`] turns raw websocket bytes into a typed [`Request`]
//! or a [`DecodeFailure`] that still knows which signal to echo in the
//! 400 reply. Even a frame that fails envelope parsing gets a best-effort
//! signal extraction so the client can correlate the error.

// `DeserializeOwned` (vs plain `Deserialize`) means the parsed value
// doesn't borrow from the input bytes — it owns all its data. That
// matters here because the raw websocket buffer is gone by the time a
// request reaches a handler.
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{
    CreateAccountRequest, CreateRoomRequest, EmotionRequest,
    EnterRoomRequest, LoginRequest, RequestFrame,
};
use crate::{ProtocolError, RequestSignal};

/// A validated inbound message, ready for dispatch.
#[derive(Debug)]
pub enum Request {
    Ping,
    EnterRoom(EnterRoomRequest),
    LeaveRoom,
    GetRoomList,
    CreateRoom(CreateRoomRequest),
    ReadyGame,
    RingBell,
    Emotion(EmotionRequest),
    CreateAccount(CreateAccountRequest),
    Login(LoginRequest),
}

impl Request {
    /// The signal this request arrived on, used to echo errors from
    /// later (state-precondition) stages of handling.
    pub fn signal(&self) -> RequestSignal {
        match self {
            Self::Ping => RequestSignal::Ping,
            Self::EnterRoom(_) => RequestSignal::EnterRoom,
            Self::LeaveRoom => RequestSignal::LeaveRoom,
            Self::GetRoomList => RequestSignal::GetRoomList,
            Self::CreateRoom(_) => RequestSignal::CreateRoom,
            Self::ReadyGame => RequestSignal::ReadyGame,
            Self::RingBell => RequestSignal::RingBell,
            Self::Emotion(_) => RequestSignal::Emotion,
            Self::CreateAccount(_) => RequestSignal::CreateAccount,
            Self::Login(_) => RequestSignal::Login,
        }
    }
}

/// A rejected inbound frame.
///
/// `echo_signal` is what the 400 reply should carry: the frame's signal
/// when one could be recovered, otherwise 0.
#[derive(Debug)]
pub struct DecodeFailure {
    pub echo_signal: u16,
    pub error: ProtocolError,
}

/// Validates raw bytes into a [`Request`].
///
/// Failure modes, in order: envelope doesn't parse, signal unknown,
/// `data` missing/null, payload doesn't match the signal's schema, or a
/// field is out of range.
pub fn decode_request(raw: &[u8]) -> Result<Request, DecodeFailure> {
    let frame: RequestFrame = match serde_json::from_slice(raw) {
        Ok(frame) => frame,
        Err(err) => {
            return Err(DecodeFailure {
                echo_signal: salvage_signal(raw),
                error: ProtocolError::Malformed(err),
            });
        }
    };

    let signal = RequestSignal::from_wire(frame.signal).ok_or(DecodeFailure {
        echo_signal: frame.signal,
        error: ProtocolError::UnknownSignal(frame.signal),
    })?;

    let data = match frame.data {
        Some(Value::Null) | None => {
            return Err(DecodeFailure {
                echo_signal: frame.signal,
                error: ProtocolError::MissingData,
            });
        }
        Some(data) => data,
    };

    let request = match signal {
        RequestSignal::Ping => Request::Ping,
        RequestSignal::LeaveRoom => Request::LeaveRoom,
        RequestSignal::GetRoomList => Request::GetRoomList,
        RequestSignal::ReadyGame => Request::ReadyGame,
        RequestSignal::RingBell => Request::RingBell,
        RequestSignal::EnterRoom => {
            let payload: EnterRoomRequest = parse_payload(signal, data)?;
            validated(signal, payload.validate())?;
            Request::EnterRoom(payload)
        }
        RequestSignal::CreateRoom => {
            let payload: CreateRoomRequest = parse_payload(signal, data)?;
            validated(signal, payload.validate())?;
            Request::CreateRoom(payload)
        }
        RequestSignal::Emotion => {
            Request::Emotion(parse_payload(signal, data)?)
        }
        RequestSignal::CreateAccount => {
            let payload: CreateAccountRequest = parse_payload(signal, data)?;
            validated(signal, payload.validate())?;
            Request::CreateAccount(payload)
        }
        RequestSignal::Login => {
            let payload: LoginRequest = parse_payload(signal, data)?;
            validated(signal, payload.validate())?;
            Request::Login(payload)
        }
    };

    Ok(request)
}

fn parse_payload<T: DeserializeOwned>(
    signal: RequestSignal,
    data: Value,
) -> Result<T, DecodeFailure> {
    serde_json::from_value(data).map_err(|err| DecodeFailure {
        echo_signal: signal.wire_id(),
        error: ProtocolError::BadPayload {
            signal,
            source: err,
        },
    })
}

fn validated(
    signal: RequestSignal,
    result: Result<(), ProtocolError>,
) -> Result<(), DecodeFailure> {
    result.map_err(|error| DecodeFailure {
        echo_signal: signal.wire_id(),
        error,
    })
}

/// Best-effort signal extraction from bytes that failed envelope parsing,
/// so the error reply can still echo what the client sent.
fn salvage_signal(raw: &[u8]) -> u16 {
    serde_json::from_slice::<Value>(raw)
        .ok()
        .and_then(|v| v.get("signal").and_then(Value::as_u64))
        .and_then(|id| u16::try_from(id).ok())
        .unwrap_or(0)
}

// =========================================================================
// Tests
// =========================================================================
