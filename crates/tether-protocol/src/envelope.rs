//! Inbound envelopes and the outbound RPC reply wrapper.
//!
//! TCP frames are decoded once, at the transport boundary, into an
//! [`InboundMessage`]. Downstream code matches on the variant instead of
//! probing the payload for RPC fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Frame field (and HTTP header) carrying the caller's RPC request id.
pub const RPC_REQUEST_ID: &str = "rpc_request_id";
/// Frame field carrying the caller's RPC authorization token.
pub const RPC_TOKEN: &str = "rpc_token";
/// Field of an outbound RPC reply holding the handler's result.
pub const RPC_RESULT: &str = "rpc_result";
/// Frame field naming the operation a TCP message targets.
pub const ROUTE: &str = "route";

/// Which binding path populated an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Tcp,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Tcp => "tcp",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded body of an inbound TCP message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Ordinary client message.
    Plain { payload: Value },
    /// Message wrapped in an RPC envelope. `token` is empty when the caller
    /// sent a request id without a token.
    Rpc {
        payload: Value,
        token: String,
        request_id: String,
    },
}

impl InboundMessage {
    /// Classify a decoded payload. A non-null `rpc_request_id` field marks the
    /// message as RPC; a missing `rpc_token` becomes the empty string.
    pub fn decode(payload: Value) -> Self {
        let request_id = payload
            .get(RPC_REQUEST_ID)
            .filter(|v| !v.is_null())
            .map(scalar_to_string);
        let Some(request_id) = request_id else {
            return Self::Plain { payload };
        };
        let token = payload
            .get(RPC_TOKEN)
            .map(scalar_to_string)
            .unwrap_or_default();
        Self::Rpc {
            payload,
            token,
            request_id,
        }
    }

    pub fn plain(payload: Value) -> Self {
        Self::Plain { payload }
    }

    pub fn payload(&self) -> &Value {
        match self {
            Self::Plain { payload } | Self::Rpc { payload, .. } => payload,
        }
    }

    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A complete inbound TCP frame: the target operation plus its message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub route: String,
    pub message: InboundMessage,
}

impl InboundFrame {
    /// Decode one frame body (the bytes between frame delimiters).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        let route = value
            .get(ROUTE)
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .ok_or(ProtocolError::MissingRoute)?
            .to_string();
        Ok(Self {
            route,
            message: InboundMessage::decode(value),
        })
    }
}

/// Outbound envelope echoing the caller's token around a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcReply {
    pub rpc_token: String,
    pub rpc_result: Value,
}

impl RpcReply {
    pub fn new(token: impl Into<String>, result: Value) -> Self {
        Self {
            rpc_token: token.into(),
            rpc_result: result,
        }
    }

    pub fn into_value(self) -> Value {
        let mut map = Map::with_capacity(2);
        map.insert(RPC_TOKEN.into(), Value::String(self.rpc_token));
        map.insert(RPC_RESULT.into(), self.rpc_result);
        Value::Object(map)
    }
}
