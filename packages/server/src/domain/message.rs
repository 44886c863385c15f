//! Inbound client message as seen by the game engine.

use serde_json::Value;

/// Parsed client envelope: the type tag plus its untyped payload.
///
/// The payload is decoded by the handler that owns the type tag, so a bad
/// payload becomes an `INVALID_PAYLOAD` reply instead of a dropped frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub kind: String,
    pub payload: Value,
}
