//! Bybit WebSocket Message Types
//!
//! Wire format types for the Bybit v5 public streams.
//!
//! # Outbound
//!
//! - `{"op": "subscribe", "args": ["{category}.{instrument}", ...]}` sent
//!   once per successful connect
//! - `{"op": "ping"}` application-level heartbeat
//!
//! # Inbound
//!
//! - Data envelopes: `{"topic": "{category}.{instrument}", "data": ...}`
//! - Command acks: `{"op": "subscribe", "success": true, ...}` and pong
//!   responses
//!
//! Data payloads are kept opaque: the archiver stores whatever the venue
//! sent, it does not validate against the venue's schemas.
//!
//! # References
//!
//! - [Bybit v5 WebSocket](https://bybit-exchange.github.io/docs/v5/ws/connect)

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Outbound Requests
// =============================================================================

/// An operation request sent to the venue.
///
/// # Wire Format (JSON)
/// ```json
/// {"op": "subscribe", "args": ["publicTrade.BTCUSDT"]}
/// {"op": "ping"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpRequest {
    /// Operation name.
    pub op: &'static str,
    /// Operation arguments; omitted when empty (ping has none).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl OpRequest {
    /// Build the single subscribe request covering every configured topic.
    #[must_use]
    pub const fn subscribe(args: Vec<String>) -> Self {
        Self {
            op: "subscribe",
            args,
        }
    }

    /// Build an application-level heartbeat ping.
    #[must_use]
    pub const fn ping() -> Self {
        Self {
            op: "ping",
            args: Vec::new(),
        }
    }

    /// Serialize to the JSON wire format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// Acknowledgment of an operation request (subscribe confirmation, pong).
///
/// # Wire Format (JSON)
/// ```json
/// {"success": true, "ret_msg": "subscribe", "conn_id": "...", "op": "subscribe"}
/// {"success": true, "ret_msg": "pong", "conn_id": "...", "op": "ping"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandAck {
    /// Operation being acknowledged.
    pub op: String,
    /// Whether the operation succeeded.
    #[serde(default)]
    pub success: Option<bool>,
    /// Venue-supplied detail message.
    #[serde(default)]
    pub ret_msg: Option<String>,
    /// Connection identifier assigned by the venue.
    #[serde(default)]
    pub conn_id: Option<String>,
}

impl CommandAck {
    /// Whether this ack reports a failure. Absent `success` counts as ok;
    /// pong acks often omit it.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.success == Some(false)
    }
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A data envelope carrying a routable topic. The full message is kept
    /// as the record payload.
    Data {
        /// The envelope's topic string.
        topic: String,
        /// The complete message as received.
        message: Value,
    },
    /// An acknowledgment of a prior request.
    Ack(CommandAck),
    /// Valid JSON without a topic or recognizable op; reported as a routing
    /// failure by the caller.
    Unknown(Value),
}

impl Inbound {
    /// Parse and classify a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not valid JSON.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;

        if let Some(topic) = value.get("topic").and_then(Value::as_str) {
            return Ok(Self::Data {
                topic: topic.to_string(),
                message: value,
            });
        }

        if value.get("op").is_some() {
            let ack: CommandAck = serde_json::from_value(value)?;
            return Ok(Self::Ack(ack));
        }

        Ok(Self::Unknown(value))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn subscribe_wire_format() {
        let request = OpRequest::subscribe(vec![
            "publicTrade.BTCUSDT".to_string(),
            "orderbook.50.BTCUSDT".to_string(),
        ]);
        let json = request.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"op":"subscribe","args":["publicTrade.BTCUSDT","orderbook.50.BTCUSDT"]}"#
        );
    }

    #[test]
    fn ping_omits_args() {
        assert_eq!(OpRequest::ping().to_json().unwrap(), r#"{"op":"ping"}"#);
    }

    #[test]
    fn data_envelope_keeps_full_message() {
        let text = r#"{"topic":"publicTrade.BTCUSDT","type":"snapshot","data":[{"p":"42000.5"}]}"#;
        match Inbound::parse(text).unwrap() {
            Inbound::Data { topic, message } => {
                assert_eq!(topic, "publicTrade.BTCUSDT");
                assert_eq!(message["data"][0]["p"], json!("42000.5"));
            }
            other => panic!("expected data envelope, got {other:?}"),
        }
    }

    #[test]
    fn subscribe_ack_is_classified() {
        let text = r#"{"success":true,"ret_msg":"subscribe","conn_id":"abc","op":"subscribe"}"#;
        match Inbound::parse(text).unwrap() {
            Inbound::Ack(ack) => {
                assert_eq!(ack.op, "subscribe");
                assert!(!ack.is_failure());
            }
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn failed_ack_is_detected() {
        let text = r#"{"success":false,"ret_msg":"error:handler not found","op":"subscribe"}"#;
        match Inbound::parse(text).unwrap() {
            Inbound::Ack(ack) => assert!(ack.is_failure()),
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn missing_topic_is_unknown_not_error() {
        let inbound = Inbound::parse(r#"{"data":[1,2,3]}"#).unwrap();
        assert!(matches!(inbound, Inbound::Unknown(_)));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Inbound::parse("not json").is_err());
    }
}
