//! Request/Response/Error envelope shapes.
//!
//! Envelopes are plain marker-keyed objects in the [`Value`] model, so
//! they travel through the codec pipeline like any other value and may
//! carry arbitrary payloads, including live streams. Construction is
//! pure; validation is total and reports failure by handing the value
//! back, never by panicking.

use streamrpc_codec::Value;

/// Marker key carrying a Request envelope's id.
pub const REQUEST_KEY: &str = "RPC_REQUEST";
/// Marker key carrying a Response envelope's id.
pub const RESPONSE_KEY: &str = "RPC_RESPONSE";
/// Marker key carrying an Error envelope's id.
pub const ERROR_KEY: &str = "RPC_ERROR";
/// Marker key flagging an RPC call payload.
pub const CALL_KEY: &str = "RPC_CALL";

/// A method invocation envelope.
#[derive(Debug)]
pub struct Request {
    pub request_id: u32,
    pub payload: Value,
}

impl Request {
    pub fn new(request_id: u32, payload: Value) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    pub fn into_value(self) -> Value {
        Value::object([
            (REQUEST_KEY, Value::from(self.request_id)),
            ("payload", self.payload),
        ])
    }

    /// Validate and extract. On mismatch the value is handed back
    /// untouched.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        extract(value, REQUEST_KEY, "payload").map(|(request_id, payload)| Self {
            request_id,
            payload,
        })
    }
}

/// A successful result envelope; the id is copied from the request it
/// answers.
#[derive(Debug)]
pub struct Response {
    pub request_id: u32,
    pub payload: Value,
}

impl Response {
    pub fn new(request_id: u32, payload: Value) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    pub fn for_request(request: &Request, payload: Value) -> Self {
        Self::new(request.request_id, payload)
    }

    pub fn into_value(self) -> Value {
        Value::object([
            (RESPONSE_KEY, Value::from(self.request_id)),
            ("payload", self.payload),
        ])
    }

    pub fn from_value(value: Value) -> Result<Self, Value> {
        extract(value, RESPONSE_KEY, "payload").map(|(request_id, payload)| Self {
            request_id,
            payload,
        })
    }
}

/// A failed result envelope.
#[derive(Debug)]
pub struct ErrorEnvelope {
    pub request_id: u32,
    pub error: Value,
}

impl ErrorEnvelope {
    pub fn new(request_id: u32, error: Value) -> Self {
        Self { request_id, error }
    }

    pub fn for_request(request: &Request, error: Value) -> Self {
        Self::new(request.request_id, error)
    }

    pub fn into_value(self) -> Value {
        Value::object([
            (ERROR_KEY, Value::from(self.request_id)),
            ("error", self.error),
        ])
    }

    pub fn from_value(value: Value) -> Result<Self, Value> {
        extract(value, ERROR_KEY, "error").map(|(request_id, error)| Self { request_id, error })
    }
}

/// The concrete payload shape carried inside Request envelopes for
/// method invocation: an ordered method path plus an argument list of
/// arbitrary values (possibly empty).
#[derive(Debug)]
pub struct RpcCall {
    pub topics: Vec<String>,
    pub args: Vec<Value>,
}

impl RpcCall {
    pub fn new(topics: impl IntoIterator<Item = impl Into<String>>, args: Vec<Value>) -> Self {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            args,
        }
    }

    pub fn into_value(self) -> Value {
        Value::object([
            (CALL_KEY, Value::Bool(true)),
            (
                "topics",
                Value::Array(self.topics.into_iter().map(Value::from).collect()),
            ),
            ("args", Value::Array(self.args)),
        ])
    }

    pub fn from_value(value: Value) -> Result<Self, Value> {
        let entries = match value {
            Value::Object(entries) => entries,
            other => return Err(other),
        };

        let shape_ok = matches!(entries.get(CALL_KEY), Some(Value::Bool(true)))
            && matches!(
                entries.get("topics"),
                Some(Value::Array(topics))
                    if topics.iter().all(|t| matches!(t, Value::String(_)))
            )
            && matches!(entries.get("args"), Some(Value::Array(_)));
        if !shape_ok {
            return Err(Value::Object(entries));
        }

        let mut entries = entries;
        let (Some(Value::Array(topic_values)), Some(Value::Array(args))) =
            (entries.remove("topics"), entries.remove("args"))
        else {
            return Err(Value::Object(entries));
        };
        let topics = topic_values
            .into_iter()
            .filter_map(|topic| match topic {
                Value::String(segment) => Some(segment),
                _ => None,
            })
            .collect();
        Ok(Self { topics, args })
    }
}

/// Any of the three envelope shapes, classified.
#[derive(Debug)]
pub enum Envelope {
    Request(Request),
    Response(Response),
    Error(ErrorEnvelope),
}

impl Envelope {
    /// Classify a decoded value. Values that are no envelope at all
    /// come back in `Err`.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        let value = match Request::from_value(value) {
            Ok(request) => return Ok(Envelope::Request(request)),
            Err(value) => value,
        };
        let value = match Response::from_value(value) {
            Ok(response) => return Ok(Envelope::Response(response)),
            Err(value) => value,
        };
        match ErrorEnvelope::from_value(value) {
            Ok(error) => Ok(Envelope::Error(error)),
            Err(value) => Err(value),
        }
    }
}

/// Extract `(id, field)` from a two-field marker object, or give the
/// value back.
fn extract(value: Value, id_key: &str, field_key: &str) -> Result<(u32, Value), Value> {
    let mut entries = match value {
        Value::Object(entries) => entries,
        other => return Err(other),
    };

    let id_ok = matches!(
        entries.get(id_key),
        Some(Value::Number(n)) if n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64
    );
    if !id_ok || !entries.contains_key(field_key) {
        return Err(Value::Object(entries));
    }

    match (entries.remove(id_key), entries.remove(field_key)) {
        (Some(Value::Number(id)), Some(field)) => Ok((id as u32, field)),
        _ => Err(Value::Object(entries)),
    }
}
