//! Frame envelope and typed payloads.
//!
//! This module defines every structure that travels "on the wire" —
//! these get serialized to JSON text, sent over the websocket, and
//! parsed on the other side. Think of this as the "vocabulary" that the
//! client and server share.
//!
//! Every message is wrapped in a frame. Like a postal envelope, it has
//! routing information on the outside (the signal id, the result code)
//! and the actual content (the payload) inside:
//!
//! ```text
//! ┌─────────────────────────────────┐
//! │ signal: 2000                    │  ← which message this is
//! │ code: 200                       │  ← success/failure (responses only)
//! │ ┌─────────────────────────────┐ │
//! │ │ data: { "fruitIndex": 2,    │ │  ← the actual content
//! │ │         "fruitCount": 4,    │ │
//! │ │         "playerIndex": 0 }  │ │
//! │ └─────────────────────────────┘ │
//! └─────────────────────────────────┘
//! ```
//!
//! `data` is always an object — an empty payload is `{}`, never `null`.
//!
//! The payload structs pin the exact camelCase field names the client
//! expects; a rename breaks the client SDK, which is why the test module
//! asserts the JSON shape of every payload.

// We import traits and macros from the `serde` crate. Serde is Rust's
// standard library for **ser**ializing and **de**serializing data. The
// two key traits:
//   - `Serialize`:   "I can be turned INTO JSON"
//   - `Deserialize`: "I can be created FROM JSON"
// The `derive` macro auto-generates these implementations for our types.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProtocolError, ResponseSignal, CODE_ERROR, CODE_OK};

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// An inbound frame as it arrives from the client, before validation.
///
/// `data` stays a raw [`Value`] at this stage; [`crate::decode_request`]
/// checks the signal and parses the payload into its typed form. A missing
/// or null `data` fails validation.
#[derive(Debug, Deserialize)]
pub struct RequestFrame {
    pub signal: u16,
    #[serde(default)]
    pub data: Option<Value>,
}

/// An outbound frame: signal, payload object, and result code.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFrame {
    pub signal: u16,
    pub data: Value,
    pub code: u16,
}

impl ResponseFrame {
    /// Builds a success frame (code 200) with a typed payload.
    pub fn ok<T: Serialize>(
        signal: ResponseSignal,
        data: &T,
    ) -> Result<Self, ProtocolError> {
        let data = serde_json::to_value(data).map_err(ProtocolError::Encode)?;
        Ok(Self {
            signal: signal.wire_id(),
            data,
            code: CODE_OK,
        })
    }

    /// Builds a success frame with an empty `{}` payload.
    pub fn ok_empty(signal: ResponseSignal) -> Self {
        Self {
            signal: signal.wire_id(),
            data: Value::Object(serde_json::Map::new()),
            code: CODE_OK,
        }
    }

    /// Builds an error frame (code 400) echoing the failing request's
    /// signal. The payload is always `{}`; the reason is logged
    /// server-side only.
    pub fn error(echo_signal: u16) -> Self {
        Self {
            signal: echo_signal,
            data: Value::Object(serde_json::Map::new()),
            code: CODE_ERROR,
        }
    }

    /// Renders the frame as JSON text for the websocket.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

// ---------------------------------------------------------------------------
// Request payloads (client → server)
// ---------------------------------------------------------------------------

/// Field length cap shared by account ids, passwords, and nicknames.
pub(crate) const MAX_ACCOUNT_FIELD: usize = 10;

/// `#[serde(rename_all = "camelCase")]` maps Rust's snake_case field
/// names onto the wire's camelCase: `room_id` here parses the JSON key
/// `"roomId"`. Every payload struct in this module uses the same
/// attribute, so the Rust side stays idiomatic while the wire format
/// stays what the client expects.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterRoomRequest {
    pub room_id: u32,
}

impl EnterRoomRequest {
    pub(crate) fn validate(&self) -> Result<(), ProtocolError> {
        if self.room_id == 0 {
            return Err(ProtocolError::InvalidField("roomId"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_name: String,
    pub max_player_count: u8,
    pub fruit_variation: u8,
    /// Bell target: the face-up total of one fruit that makes a slap
    /// correct. Named `fruitCount` on the wire.
    pub fruit_count: u8,
    pub speed: u8,
}

impl CreateRoomRequest {
    pub(crate) fn validate(&self) -> Result<(), ProtocolError> {
        if self.room_name.trim().is_empty() {
            return Err(ProtocolError::InvalidField("roomName"));
        }
        if !(2..=8).contains(&self.max_player_count) {
            return Err(ProtocolError::InvalidField("maxPlayerCount"));
        }
        if !(2..=6).contains(&self.fruit_variation) {
            return Err(ProtocolError::InvalidField("fruitVariation"));
        }
        if !(3..=8).contains(&self.fruit_count) {
            return Err(ProtocolError::InvalidField("fruitCount"));
        }
        if self.speed > 3 {
            return Err(ProtocolError::InvalidField("speed"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionRequest {
    pub emotion_type: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    pub id: String,
    pub password: String,
    pub nickname: String,
}

impl CreateAccountRequest {
    pub(crate) fn validate(&self) -> Result<(), ProtocolError> {
        check_account_field("id", &self.id)?;
        check_account_field("password", &self.password)?;
        check_account_field("nickname", &self.nickname)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
}

impl LoginRequest {
    pub(crate) fn validate(&self) -> Result<(), ProtocolError> {
        if self.id.is_empty() {
            return Err(ProtocolError::InvalidField("id"));
        }
        if self.password.is_empty() {
            return Err(ProtocolError::InvalidField("password"));
        }
        Ok(())
    }
}

fn check_account_field(
    name: &'static str,
    value: &str,
) -> Result<(), ProtocolError> {
    if value.is_empty() || value.chars().count() > MAX_ACCOUNT_FIELD {
        return Err(ProtocolError::InvalidField(name));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Response payloads (server → client)
// ---------------------------------------------------------------------------

/// Connection greeting, sent once on the Pong signal right after the
/// websocket handshake.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloData {
    pub client_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PongData {
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterRoomData {
    pub room_id: u32,
    pub room_name: String,
    pub max_players: u8,
    pub fruit_variation: u8,
    pub fruit_bell_count: u8,
    pub game_tempo: u8,
}

/// One room in the lobby listing. Note the legacy `roomID` spelling —
/// the listing uses it while `EnterRoom` uses `roomId`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    #[serde(rename = "roomID")]
    pub room_id: u32,
    pub room_name: String,
    pub player_count: u32,
    pub max_player_count: u8,
    pub fruit_variation: u8,
    pub fruit_count: u8,
    pub speed: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomListData {
    pub rooms: Vec<RoomSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomData {
    #[serde(rename = "roomID")]
    pub room_id: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCountChangedData {
    pub player_count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameData {
    pub player_count: u32,
    pub player_names: Vec<String>,
    pub my_index: u32,
    pub starting_cards: u32,
    /// Game time limit in seconds.
    pub game_time_limit: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenCardData {
    pub fruit_index: i32,
    pub fruit_count: i32,
    pub player_index: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BellCorrectData {
    pub player_index: u32,
    pub player_cards: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BellWrongData {
    pub player_index: u32,
    pub card_given_to: Vec<bool>,
    pub player_cards: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionData {
    pub player_index: u32,
    pub emotion_type: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndGameData {
    pub player_cards: Vec<u32>,
    pub player_ranks: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAccountData {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginData {
    pub id: String,
    pub nickname: String,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The client SDK parses these shapes byte for byte, so each payload
    //! gets a test pinning its JSON field names.

    use super::*;

    #[test]
    fn test_ok_frame_carries_code_200() {
        let frame =
            ResponseFrame::ok(ResponseSignal::Pong, &PongData { timestamp: 7 })
                .unwrap();
        let json: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["signal"], 1);
        assert_eq!(json["code"], 200);
        assert_eq!(json["data"]["timestamp"], 7);
    }

    #[test]
    fn test_ok_empty_frame_has_object_data() {
        let frame = ResponseFrame::ok_empty(ResponseSignal::LeaveRoom);
        let json: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["signal"], 1002);
        assert_eq!(json["code"], 200);
        assert!(json["data"].is_object());
        assert_eq!(json["data"], serde_json::json!({}));
    }

    #[test]
    fn test_error_frame_echoes_signal_with_empty_data() {
        let frame = ResponseFrame::error(1004);
        let json: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["signal"], 1004);
        assert_eq!(json["code"], 400);
        assert_eq!(json["data"], serde_json::json!({}));
    }

    #[test]
    fn test_enter_room_request_field_name() {
        let req: EnterRoomRequest =
            serde_json::from_str(r#"{"roomId": 3}"#).unwrap();
        assert_eq!(req.room_id, 3);
        assert!(req.validate().is_ok());
        assert!(EnterRoomRequest { room_id: 0 }.validate().is_err());
    }

    #[test]
    fn test_create_room_request_ranges() {
        let ok = CreateRoomRequest {
            room_name: "friday".into(),
            max_player_count: 4,
            fruit_variation: 3,
            fruit_count: 5,
            speed: 0,
        };
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.room_name = "   ".into();
        assert!(bad.validate().is_err());

        let mut bad = ok.clone();
        bad.max_player_count = 1;
        assert!(bad.validate().is_err());
        bad.max_player_count = 9;
        assert!(bad.validate().is_err());

        let mut bad = ok.clone();
        bad.fruit_variation = 7;
        assert!(bad.validate().is_err());

        let mut bad = ok.clone();
        bad.fruit_count = 2;
        assert!(bad.validate().is_err());

        let mut bad = ok;
        bad.speed = 4;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_create_account_request_length_caps() {
        let ok = CreateAccountRequest {
            id: "haye".into(),
            password: "secret".into(),
            nickname: "haye".into(),
        };
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.id = "elevenchars".into();
        assert!(bad.validate().is_err());

        let mut bad = ok;
        bad.nickname = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_room_summary_uses_legacy_room_id_spelling() {
        let summary = RoomSummary {
            room_id: 1,
            room_name: "r".into(),
            player_count: 1,
            max_player_count: 4,
            fruit_variation: 3,
            fruit_count: 5,
            speed: 2,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("roomID").is_some());
        assert!(json.get("roomId").is_none());
        assert_eq!(json["maxPlayerCount"], 4);
        assert_eq!(json["fruitCount"], 5);
    }

    #[test]
    fn test_create_room_data_uses_legacy_room_id_spelling() {
        let json =
            serde_json::to_value(CreateRoomData { room_id: 12 }).unwrap();
        assert_eq!(json["roomID"], 12);
    }

    #[test]
    fn test_enter_room_data_shape() {
        let json = serde_json::to_value(EnterRoomData {
            room_id: 2,
            room_name: "r".into(),
            max_players: 4,
            fruit_variation: 3,
            fruit_bell_count: 5,
            game_tempo: 1,
        })
        .unwrap();
        assert_eq!(json["roomId"], 2);
        assert_eq!(json["maxPlayers"], 4);
        assert_eq!(json["fruitBellCount"], 5);
        assert_eq!(json["gameTempo"], 1);
    }

    #[test]
    fn test_start_game_data_shape() {
        let json = serde_json::to_value(StartGameData {
            player_count: 2,
            player_names: vec!["a".into(), "b".into()],
            my_index: 1,
            starting_cards: 5,
            game_time_limit: 120,
        })
        .unwrap();
        assert_eq!(json["playerCount"], 2);
        assert_eq!(json["playerNames"][1], "b");
        assert_eq!(json["myIndex"], 1);
        assert_eq!(json["startingCards"], 5);
        assert_eq!(json["gameTimeLimit"], 120);
    }

    #[test]
    fn test_open_card_data_shape() {
        let json = serde_json::to_value(OpenCardData {
            fruit_index: 2,
            fruit_count: 4,
            player_index: 0,
        })
        .unwrap();
        assert_eq!(json["fruitIndex"], 2);
        assert_eq!(json["fruitCount"], 4);
        assert_eq!(json["playerIndex"], 0);
    }

    #[test]
    fn test_bell_wrong_data_shape() {
        let json = serde_json::to_value(BellWrongData {
            player_index: 1,
            card_given_to: vec![true, false, true],
            player_cards: vec![0, 6, 6],
        })
        .unwrap();
        assert_eq!(json["cardGivenTo"], serde_json::json!([true, false, true]));
        assert_eq!(json["playerCards"], serde_json::json!([0, 6, 6]));
    }

    #[test]
    fn test_end_game_data_shape() {
        let json = serde_json::to_value(EndGameData {
            player_cards: vec![8, 8, 4],
            player_ranks: vec![1, 1, 3],
        })
        .unwrap();
        assert_eq!(json["playerCards"], serde_json::json!([8, 8, 4]));
        assert_eq!(json["playerRanks"], serde_json::json!([1, 1, 3]));
    }

    #[test]
    fn test_emotion_round_trip() {
        let req: EmotionRequest =
            serde_json::from_str(r#"{"emotionType": 2}"#).unwrap();
        assert_eq!(req.emotion_type, 2);

        let json = serde_json::to_value(EmotionData {
            player_index: 3,
            emotion_type: 2,
        })
        .unwrap();
        assert_eq!(json["playerIndex"], 3);
        assert_eq!(json["emotionType"], 2);
    }
}
