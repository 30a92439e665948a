//! JSON text framing for the Blade control channel.
//!
//! Outbound messages are serialized once; inbound frames are decoded once
//! into [`Inbound`], the only shape the dispatcher ever matches on.

use serde_json::Value;

use crate::error::BladeResult;
use crate::messages::{method, JsonRpcResponse, Message};

/// Serialize a message into a text frame.
pub fn encode(message: &Message) -> BladeResult<String> {
    Ok(serde_json::to_string(message)?)
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to one of our requests (no `method`).
    Response(JsonRpcResponse),
    /// Server keepalive; the timestamp is echoed back.
    Ping { id: Value, timestamp: Option<Value> },
    /// Server notice that the connection is about to close.
    Disconnect { id: Value },
    /// Any other server-initiated message.
    Event(Value),
    /// Not JSON, or not an object.
    Malformed(String),
}

impl Inbound {
    /// The frame identifier, when it is a string. Only string ids can
    /// correlate with our own requests.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Response(r) => r.id.as_str(),
            Self::Ping { id, .. } | Self::Disconnect { id } => id.as_str(),
            Self::Event(v) => v.get("id").and_then(Value::as_str),
            Self::Malformed(_) => None,
        }
    }
}

/// Decode a text frame. Never fails: unusable input becomes [`Inbound::Malformed`].
pub fn decode(text: &str) -> Inbound {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return Inbound::Malformed(text.to_string()),
    };
    if !value.is_object() {
        return Inbound::Malformed(text.to_string());
    }

    let id = value.get("id").filter(|id| !id.is_null()).cloned();
    let method_name = value.get("method").and_then(Value::as_str).map(str::to_string);

    match (method_name.as_deref(), id) {
        (Some(method::PING), Some(id)) => Inbound::Ping {
            id,
            timestamp: value
                .get("params")
                .and_then(|p| p.get("timestamp"))
                .cloned(),
        },
        (Some(method::DISCONNECT), Some(id)) => Inbound::Disconnect { id },
        (Some(_), _) => Inbound::Event(value),
        (None, Some(_)) => match serde_json::from_value::<JsonRpcResponse>(value.clone()) {
            Ok(response) => Inbound::Response(response),
            Err(_) => Inbound::Event(value),
        },
        (None, None) => Inbound::Event(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::blade_ping_response;
    use serde_json::json;

    #[test]
    fn encode_response() {
        let frame = encode(&Message::from(blade_ping_response("p1", Some(json!(5))))).unwrap();
        let back: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(back, json!({"jsonrpc":"2.0","id":"p1","result":{"timestamp":5}}));
    }

    #[test]
    fn decode_ping() {
        let inbound =
            decode(r#"{"jsonrpc":"2.0","id":"p1","method":"blade.ping","params":{"timestamp":1234}}"#);
        assert_eq!(
            inbound,
            Inbound::Ping {
                id: json!("p1"),
                timestamp: Some(json!(1234))
            }
        );
        assert_eq!(inbound.id(), Some("p1"));
    }

    #[test]
    fn decode_ping_without_timestamp() {
        let inbound = decode(r#"{"jsonrpc":"2.0","id":"p2","method":"blade.ping"}"#);
        assert_eq!(
            inbound,
            Inbound::Ping {
                id: json!("p2"),
                timestamp: None
            }
        );
    }

    #[test]
    fn decode_disconnect() {
        let inbound = decode(r#"{"jsonrpc":"2.0","id":"d1","method":"blade.disconnect","params":{}}"#);
        assert_eq!(inbound, Inbound::Disconnect { id: json!("d1") });
    }

    #[test]
    fn decode_response() {
        match decode(r#"{"jsonrpc":"2.0","id":"r1","result":{"a":1}}"#) {
            Inbound::Response(r) => {
                assert_eq!(r.id, "r1");
                assert_eq!(r.result, Some(json!({"a": 1})));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decode_broadcast_as_event() {
        let text = r#"{"jsonrpc":"2.0","id":"b1","method":"blade.broadcast","params":{"event":"conference"}}"#;
        match decode(text) {
            Inbound::Event(v) => assert_eq!(v["params"]["event"], "conference"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(decode("not json"), Inbound::Malformed("not json".into()));
        assert_eq!(decode("[1,2]"), Inbound::Malformed("[1,2]".into()));
        assert_eq!(decode("not json").id(), None);
    }

    #[test]
    fn numeric_ids_are_kept_for_server_calls() {
        let inbound = decode(r#"{"jsonrpc":"2.0","id":42,"method":"blade.ping","params":{"timestamp":9}}"#);
        assert_eq!(
            inbound,
            Inbound::Ping {
                id: json!(42),
                timestamp: Some(json!(9))
            }
        );
        assert_eq!(inbound.id(), None);

        let inbound = decode(r#"{"jsonrpc":"2.0","id":7,"method":"blade.disconnect"}"#);
        assert_eq!(inbound, Inbound::Disconnect { id: json!(7) });
    }

    #[test]
    fn numeric_id_reply_never_correlates() {
        match decode(r#"{"jsonrpc":"2.0","id":7,"result":{}}"#) {
            Inbound::Response(r) => assert_eq!(r.id, json!(7)),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(decode(r#"{"jsonrpc":"2.0","id":7,"result":{}}"#).id(), None);
    }

    #[test]
    fn null_id_ping_is_an_event() {
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","id":null,"method":"blade.ping"}"#),
            Inbound::Event(_)
        ));
    }
}
