//! Engine.IO v4 / Socket.IO v5 text frame codec.
//!
//! The backend speaks Socket.IO over a plain WebSocket. Each text frame
//! starts with an Engine.IO packet type digit; Engine.IO `message` packets
//! (`4`) carry a Socket.IO packet whose own type digit follows, then an
//! optional `/namespace,` prefix, an optional ack id, and a JSON body:
//!
//! ```text
//! 0{"sid":"…","pingInterval":25000,"pingTimeout":20000}   open
//! 2                                                       ping (reply 3)
//! 40{"sid":"…"}                                           namespace connected
//! 42["attack_detected",{…}]                               event
//! 42/admin,7["event",{…}]                                 namespaced event with ack id
//! ```
//!
//! Binary attachments are never produced by the backend and are rejected.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// Frame the client sends in answer to an Engine.IO ping.
pub const PONG_FRAME: &str = "3";

/// Default Socket.IO namespace.
pub const DEFAULT_NAMESPACE: &str = "/";

// ── Packet ───────────────────────────────────────────────────────────

/// Engine.IO handshake carried by the `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    /// `noop`, `upgrade` and Socket.IO acks; nothing to act on.
    Noop,
    Connect {
        namespace: String,
        sid: Option<String>,
    },
    Disconnect {
        namespace: String,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
    Event {
        namespace: String,
        name: String,
        payload: Value,
        ack: Option<u64>,
    },
}

// ── Encoding ─────────────────────────────────────────────────────────

/// Frame requesting a connection to `namespace`.
pub fn connect_frame(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        "40".to_owned()
    } else {
        format!("40{namespace},")
    }
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode one WebSocket text frame.
pub fn decode(frame: &str) -> Result<Packet, Error> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty frame".into()))?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(Packet::Open)
            .map_err(|e| Error::Protocol(format!("bad open packet: {e}"))),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_message(rest),
        '5' | '6' => Ok(Packet::Noop),
        other => Err(Error::Protocol(format!(
            "unknown engine.io packet type {other:?}"
        ))),
    }
}

fn decode_message(body: &str) -> Result<Packet, Error> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty socket.io packet".into()))?;
    let (namespace, rest) = split_namespace(chars.as_str());

    match kind {
        '0' => {
            #[derive(Deserialize)]
            struct ConnectAck {
                sid: Option<String>,
            }
            let sid = if rest.is_empty() {
                None
            } else {
                serde_json::from_str::<ConnectAck>(rest)
                    .map_err(|e| Error::Protocol(format!("bad connect packet: {e}")))?
                    .sid
            };
            Ok(Packet::Connect { namespace, sid })
        }
        '1' => Ok(Packet::Disconnect { namespace }),
        '2' => {
            let (ack, json) = split_ack(rest);
            let mut items: Vec<Value> = serde_json::from_str(json)
                .map_err(|e| Error::Protocol(format!("bad event packet: {e}")))?;
            if items.is_empty() {
                return Err(Error::Protocol("event packet without a name".into()));
            }
            let name = match items.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(Error::Protocol(format!(
                        "event name is not a string: {other}"
                    )));
                }
            };
            let payload = if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            };
            Ok(Packet::Event {
                namespace,
                name,
                payload,
                ack,
            })
        }
        '3' => Ok(Packet::Noop),
        '4' => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| rest.to_owned());
            Ok(Packet::ConnectError { namespace, message })
        }
        '5' | '6' => Err(Error::Protocol("binary socket.io packets are not supported".into())),
        other => Err(Error::Protocol(format!(
            "unknown socket.io packet type {other:?}"
        ))),
    }
}

/// Split an optional `/namespace,` prefix off a Socket.IO packet body.
fn split_namespace(body: &str) -> (String, &str) {
    if !body.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_owned(), body);
    }
    match body.find(',') {
        Some(idx) => (body[..idx].to_owned(), &body[idx + 1..]),
        None => (body.to_owned(), ""),
    }
}

/// Split an optional numeric ack id off the front of an event body.
fn split_ack(body: &str) -> (Option<u64>, &str) {
    let end = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    if end == 0 {
        return (None, body);
    }
    (body[..end].parse().ok(), &body[end..])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_open_handshake() {
        let packet =
            decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
                .unwrap();
        assert_eq!(
            packet,
            Packet::Open(Handshake {
                sid: "abc".into(),
                ping_interval: 25000,
                ping_timeout: 20000,
            })
        );
    }

    #[test]
    fn decodes_control_packets() {
        assert_eq!(decode("1").unwrap(), Packet::Close);
        assert_eq!(decode("2").unwrap(), Packet::Ping);
        assert_eq!(decode("3").unwrap(), Packet::Pong);
        assert_eq!(decode("6").unwrap(), Packet::Noop);
    }

    #[test]
    fn decodes_namespace_connect_ack() {
        assert_eq!(
            decode(r#"40{"sid":"xyz"}"#).unwrap(),
            Packet::Connect {
                namespace: "/".into(),
                sid: Some("xyz".into()),
            }
        );
        assert_eq!(
            decode("40/admin,").unwrap(),
            Packet::Connect {
                namespace: "/admin".into(),
                sid: None,
            }
        );
    }

    #[test]
    fn decodes_event_with_payload() {
        let packet = decode(r#"42["system_stats",{"cpu":12.5}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::Event {
                namespace: "/".into(),
                name: "system_stats".into(),
                payload: json!({"cpu": 12.5}),
                ack: None,
            }
        );
    }

    #[test]
    fn decodes_namespaced_event_with_ack_id() {
        let packet = decode(r#"42/admin,7["ip_blocked",{"ip":"10.0.0.1"}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::Event {
                namespace: "/admin".into(),
                name: "ip_blocked".into(),
                payload: json!({"ip": "10.0.0.1"}),
                ack: Some(7),
            }
        );
    }

    #[test]
    fn event_without_payload_is_null() {
        let Packet::Event { payload, .. } = decode(r#"42["ping_me"]"#).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(payload, Value::Null);
    }

    #[test]
    fn decodes_connect_error_message() {
        assert_eq!(
            decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            Packet::ConnectError {
                namespace: "/".into(),
                message: "Not authorized".into(),
            }
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(decode("").is_err());
        assert!(decode("9").is_err());
        assert!(decode("42not json").is_err());
        assert!(decode("42[]").is_err());
        assert!(decode("42[1,2]").is_err());
        assert!(decode(r#"451-["upload",{"_placeholder":true,"num":0}]"#).is_err());
    }

    #[test]
    fn connect_frame_for_namespaces() {
        assert_eq!(connect_frame("/"), "40");
        assert_eq!(connect_frame("/admin"), "40/admin,");
    }
}
