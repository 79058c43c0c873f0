//! Request and response envelopes of the remote-call protocol.
//!
//! A request is `{"jsonrpc": "2.0", "id": n, "method": "call"|"list",
//! "params": ...}`; for `"call"` the params are
//! `[session_id, object, function, argument_map]`. The response mirrors
//! the id and carries `result` as `[status, payload?]` or an `error`
//! member. A non-zero status means "no data", not a failed batch.

use serde_json::{Map, Value, json};

use crate::error::RpcError;

/// Protocol version tag carried by every envelope.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Remote status code for a successful call.
pub const STATUS_OK: i64 = 0;

/// One remote call: target object, function and named arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    pub object: String,
    pub function: String,
    pub args: Map<String, Value>,
}

impl CallSpec {
    pub fn new(object: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            function: function.into(),
            args: Map::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    /// Full request envelope for the positional convention.
    pub fn to_envelope(&self, id: u64, session: &str) -> Value {
        json!({
            "jsonrpc": PROTOCOL_VERSION,
            "id": id,
            "method": "call",
            "params": [session, self.object, self.function, self.args],
        })
    }

    /// `[object, function, args]` triple for the keyed-map convention.
    pub fn to_triple(&self) -> Value {
        json!([self.object, self.function, self.args])
    }
}

/// Request envelope for capability discovery.
pub fn list_envelope(id: u64, patterns: &[&str]) -> Value {
    let params = if patterns.is_empty() {
        Value::Null
    } else {
        json!(patterns)
    };
    json!({
        "jsonrpc": PROTOCOL_VERSION,
        "id": id,
        "method": "list",
        "params": params,
    })
}

/// Result of one remote call after status decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Status 0; payload is `Value::Null` for calls without one.
    Data(Value),
    /// Non-zero status: the call yielded nothing. Distinct from a
    /// present-but-empty payload.
    NoData(i64),
}

impl Outcome {
    pub fn into_data(self) -> Option<Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::NoData(_) => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData(_))
    }
}

/// A verified response frame: correlation id plus decoded outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub id: u64,
    pub outcome: Outcome,
}

impl ResponseFrame {
    /// Verify the envelope discriminators and decode the result array.
    pub fn parse(raw: &Value) -> Result<Self, RpcError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| RpcError::Frame("response is not an object".into()))?;

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(PROTOCOL_VERSION) {
            return Err(RpcError::Frame("missing or wrong version tag".into()));
        }

        let id = obj
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| RpcError::Frame("missing correlation id".into()))?;

        if let Some(error) = obj.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(RpcError::Remote { code, message });
        }

        let outcome = decode_result(obj.get("result"))?;
        Ok(Self { id, outcome })
    }
}

/// Decode a `[status, payload?]` result array into an outcome.
pub fn decode_result(result: Option<&Value>) -> Result<Outcome, RpcError> {
    let items = result
        .and_then(Value::as_array)
        .ok_or_else(|| RpcError::Frame("missing result array".into()))?;

    let status = items
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| RpcError::Frame("missing status code".into()))?;

    if status != STATUS_OK {
        return Ok(Outcome::NoData(status));
    }

    Ok(Outcome::Data(items.get(1).cloned().unwrap_or(Value::Null)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_wrong_version() {
        let raw = json!({"jsonrpc": "1.0", "id": 1, "result": [0]});
        assert!(matches!(
            ResponseFrame::parse(&raw),
            Err(RpcError::Frame(_))
        ));
    }

    #[test]
    fn parse_rejects_missing_id() {
        let raw = json!({"jsonrpc": "2.0", "result": [0]});
        assert!(matches!(
            ResponseFrame::parse(&raw),
            Err(RpcError::Frame(_))
        ));
    }

    #[test]
    fn nonzero_status_is_no_data_not_error() {
        let raw = json!({"jsonrpc": "2.0", "id": 7, "result": [4]});
        let frame = ResponseFrame::parse(&raw).unwrap();
        assert_eq!(frame.outcome, Outcome::NoData(4));
    }

    #[test]
    fn payload_less_success_decodes_to_null() {
        let raw = json!({"jsonrpc": "2.0", "id": 7, "result": [0]});
        let frame = ResponseFrame::parse(&raw).unwrap();
        assert_eq!(frame.outcome, Outcome::Data(Value::Null));
    }

    #[test]
    fn error_member_maps_to_remote_error() {
        let raw = json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": -32601, "message": "method not found"},
        });
        assert!(matches!(
            ResponseFrame::parse(&raw),
            Err(RpcError::Remote { code: -32601, .. })
        ));
    }
}
