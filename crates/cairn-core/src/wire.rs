//! Cairn wire format: the frames exchanged over a WebSocket session.
//!
//! Every inbound message is a JSON array `[requestId, routingKey, payload]`.
//! Every outbound message is a JSON array `[correlationId, errorOrNull, data]`.
//! Anything that is not a JSON array is a protocol error and is rejected at
//! this boundary, before any handler sees it.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Method name reserved for the login ingress path.
pub const LOGIN_METHOD: &str = "login";

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("inbound frame is not a JSON array")]
    NotAnArray,
    #[error("malformed reply frame: {0}")]
    MalformedReply(serde_json::Error),
    #[error("failed to encode frame: {0}")]
    Encode(serde_json::Error),
}

// ── Request id ────────────────────────────────────────────────────────────────

/// Opaque request identifier chosen by the client and echoed back verbatim.
/// Broadcast frames reuse it to carry the session id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Value);

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(Value::String(s.to_string()))
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(Value::String(s))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

// ── Call frame ────────────────────────────────────────────────────────────────

/// Inbound unit of communication.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    pub request_id: RequestId,
    /// Discovery key the client addressed. Informational only.
    pub routing_key: String,
    /// Expected to be an object with a `method` field; not enforced here.
    pub payload: Value,
}

impl CallFrame {
    pub fn new(request_id: impl Into<RequestId>, routing_key: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: request_id.into(),
            routing_key: routing_key.into(),
            payload,
        }
    }

    /// Parse a raw text frame.
    ///
    /// Short arrays are accepted: missing slots become `null` / empty.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(|_| FrameError::NotAnArray)?;
        let items = match value {
            Value::Array(items) => items,
            _ => return Err(FrameError::NotAnArray),
        };

        let mut items = items.into_iter();
        let request_id = RequestId(items.next().unwrap_or(Value::Null));
        let routing_key = match items.next() {
            Some(Value::String(key)) => key,
            _ => String::new(),
        };
        let payload = items.next().unwrap_or(Value::Null);

        Ok(Self {
            request_id,
            routing_key,
            payload,
        })
    }

    pub fn encode(&self) -> Result<String, FrameError> {
        serde_json::to_string(&(&self.request_id, &self.routing_key, &self.payload))
            .map_err(FrameError::Encode)
    }

    /// The requested method name, or `""` when the payload has none.
    pub fn method(&self) -> &str {
        self.payload
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn is_login(&self) -> bool {
        self.method() == LOGIN_METHOD
    }

    /// Credentials of a recognised login attempt.
    ///
    /// `None` unless the payload is an object, `method` is exactly `"login"`
    /// and `auth` is an object. Callers drop such frames without replying.
    pub fn login_auth(&self) -> Option<&Map<String, Value>> {
        let payload = self.payload.as_object()?;
        if payload.get("method").and_then(Value::as_str) != Some(LOGIN_METHOD) {
            return None;
        }
        payload.get("auth")?.as_object()
    }

    /// Named arguments: the payload object minus its `method` key.
    pub fn args(&self) -> Map<String, Value> {
        match &self.payload {
            Value::Object(map) => {
                let mut args = map.clone();
                args.remove("method");
                args
            }
            _ => Map::new(),
        }
    }
}

// ── Reply frame ───────────────────────────────────────────────────────────────

/// Outbound unit of communication, encoded as `[correlationId, error, data]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyFrame {
    pub correlation_id: RequestId,
    pub error: Option<String>,
    pub data: Value,
}

impl ReplyFrame {
    pub fn ok(correlation_id: impl Into<RequestId>, data: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            error: None,
            data,
        }
    }

    /// Error reply. The message is the error's `Display` output; data is `null`.
    pub fn err(correlation_id: impl Into<RequestId>, error: impl fmt::Display) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            error: Some(error.to_string()),
            data: Value::Null,
        }
    }

    /// Server push addressed to a session: data is `{ action, result }`.
    pub fn broadcast(session_id: &str, action: &str, result: Value) -> Self {
        Self::ok(session_id, json!({ "action": action, "result": result }))
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn encode(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Encode)
    }

    /// Client-side decoding, used by tooling and tests.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        serde_json::from_str(text).map_err(FrameError::MalformedReply)
    }
}

impl Serialize for ReplyFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.correlation_id, &self.error, &self.data).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReplyFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (correlation_id, error, data) =
            <(RequestId, Option<String>, Value)>::deserialize(deserializer)?;
        Ok(Self {
            correlation_id,
            error,
            data,
        })
    }
}
