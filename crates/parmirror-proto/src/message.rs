//! The closed message vocabulary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::ParamValue;

/// Message type tag: client attach handshake.
pub const TYPE_CLIENT_READY: &str = "client_ready";
/// Message type tag: full schema + state snapshot.
pub const TYPE_SCHEMA_UPDATE: &str = "schema_update";
/// Message type tag: partial value delta.
pub const TYPE_PARAMETER_UPDATE: &str = "parameter_update";
/// Message type tag: tear down the UI for an operation.
pub const TYPE_REMOVE_WINDOW: &str = "remove_window";
/// Message type tag: liveness request.
pub const TYPE_PING: &str = "ping";
/// Message type tag: liveness response.
pub const TYPE_PONG: &str = "pong";

/// One protocol message, tagged by its `"type"` field on the wire.
///
/// `schema_update` is always authoritative: it replaces any prior
/// partial state a receiver holds for that operation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Client → relay: ready to receive the current snapshot.
    ClientReady,
    /// Host → clients: full snapshot of the bound operation.
    SchemaUpdate {
        id: String,
        title: String,
        /// Opaque schema document; never interpreted by the core.
        schema: Value,
        state: BTreeMap<String, ParamValue>,
    },
    /// Either direction: changed values only.
    ParameterUpdate {
        id: String,
        values: BTreeMap<String, ParamValue>,
    },
    /// Host → clients: the UI for this operation should be torn down.
    RemoveWindow { id: String },
    /// Liveness request; `payload` is opaque and echoed back verbatim.
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Liveness response carrying the request's payload.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// An unrecognized `"type"`. Dropped by every consumer; the raw
    /// document is retained so encode can pass it through unchanged.
    #[serde(skip)]
    Unknown { kind: String, raw: Value },
}

impl Message {
    /// A `client_ready` handshake message.
    pub fn client_ready() -> Self {
        Message::ClientReady
    }

    /// A `ping` without payload.
    pub fn ping() -> Self {
        Message::Ping { payload: None }
    }

    /// The `pong` answering a `ping`, echoing its payload.
    pub fn pong_for(payload: Option<Value>) -> Self {
        Message::Pong { payload }
    }

    /// A `remove_window` for `id`.
    pub fn remove_window(id: impl Into<String>) -> Self {
        Message::RemoveWindow { id: id.into() }
    }

    /// The message type tag as it appears on the wire.
    pub fn kind(&self) -> &str {
        match self {
            Message::ClientReady => TYPE_CLIENT_READY,
            Message::SchemaUpdate { .. } => TYPE_SCHEMA_UPDATE,
            Message::ParameterUpdate { .. } => TYPE_PARAMETER_UPDATE,
            Message::RemoveWindow { .. } => TYPE_REMOVE_WINDOW,
            Message::Ping { .. } => TYPE_PING,
            Message::Pong { .. } => TYPE_PONG,
            Message::Unknown { kind, .. } => kind,
        }
    }

    /// The operation id this message concerns, for id-carrying variants.
    pub fn operation_id(&self) -> Option<&str> {
        match self {
            Message::SchemaUpdate { id, .. }
            | Message::ParameterUpdate { id, .. }
            | Message::RemoveWindow { id } => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tag_on_wire() {
        let json = serde_json::to_value(Message::client_ready()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "client_ready"}));
    }

    #[test]
    fn ping_without_payload_omits_field() {
        let json = serde_json::to_string(&Message::ping()).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn operation_id_only_on_id_carrying_variants() {
        assert_eq!(Message::remove_window("op-42").operation_id(), Some("op-42"));
        assert_eq!(Message::ping().operation_id(), None);
        assert_eq!(Message::client_ready().operation_id(), None);
    }

    #[test]
    fn parameter_update_wire_shape() {
        let msg = Message::ParameterUpdate {
            id: "op-42".into(),
            values: [("speed".to_string(), ParamValue::Number(4.0))].into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "parameter_update",
                "id": "op-42",
                "values": {"speed": 4.0}
            })
        );
    }
}
