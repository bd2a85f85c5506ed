//! Message ⇄ payload codec.
//!
//! Encoding stamps a `"v"` protocol-version field on every outgoing
//! document. Decoding tolerates its absence — peers from before the
//! field existed stay valid — and never rejects a message based on it.

use serde_json::Value;

use crate::error::{DecodeError, WireError};
use crate::message::{
    Message, TYPE_CLIENT_READY, TYPE_PARAMETER_UPDATE, TYPE_PING, TYPE_PONG, TYPE_REMOVE_WINDOW,
    TYPE_SCHEMA_UPDATE,
};

/// Current protocol version stamped on outgoing messages.
pub const PROTOCOL_VERSION: u32 = 1;

const KNOWN_TYPES: [&str; 6] = [
    TYPE_CLIENT_READY,
    TYPE_SCHEMA_UPDATE,
    TYPE_PARAMETER_UPDATE,
    TYPE_REMOVE_WINDOW,
    TYPE_PING,
    TYPE_PONG,
];

/// Serialize a message to its JSON payload.
///
/// [`Message::Unknown`] passes its raw document through unchanged.
pub fn encode(msg: &Message) -> Result<Vec<u8>, WireError> {
    let value = match msg {
        Message::Unknown { raw, .. } => raw.clone(),
        known => {
            let mut value = serde_json::to_value(known).map_err(WireError::Encode)?;
            if let Value::Object(map) = &mut value {
                map.insert("v".to_string(), Value::from(PROTOCOL_VERSION));
            }
            value
        }
    };
    serde_json::to_vec(&value).map_err(WireError::Encode)
}

/// Deserialize a message from its JSON payload.
///
/// An unrecognized `"type"` is not an error: it decodes into
/// [`Message::Unknown`] so consumers can drop it deliberately. A
/// recognized `"type"` with a malformed payload is a [`DecodeError`];
/// the caller's policy is to log and drop, never to propagate.
pub fn decode(payload: &[u8]) -> Result<Message, DecodeError> {
    let value: Value = serde_json::from_slice(payload).map_err(DecodeError::Malformed)?;

    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => return Err(DecodeError::MissingType),
    };

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Ok(Message::Unknown { kind, raw: value });
    }

    serde_json::from_value(value).map_err(|source| DecodeError::Payload { kind, source })
}
