//! Error types for the protocol layer.

/// Errors that can occur while parsing, validating, or rendering frames.
///
/// None of these reach the client verbatim — a failed request produces a
/// `code: 400` frame with an empty payload, and the error itself goes to
/// the server log.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound frame failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The inbound bytes are not a valid frame envelope.
    #[error("malformed frame: {0}")]
    Malformed(serde_json::Error),

    /// The frame's signal id is not in the request registry.
    #[error("unknown signal {0}")]
    UnknownSignal(u16),

    /// The frame has no `data` object (missing or null).
    #[error("missing data object")]
    MissingData,

    /// The `data` object does not parse as the signal's payload type.
    #[error("bad payload for {signal}: {source}")]
    BadPayload {
        signal: crate::RequestSignal,
        source: serde_json::Error,
    },

    /// A payload field is out of range or violates a length rule.
    #[error("invalid field {0}")]
    InvalidField(&'static str),
}
