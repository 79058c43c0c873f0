use async_trait::async_trait;
use serde_json::Value;

use crate::error::RpcError;

/// Wire endpoint: takes one request body, returns one response body.
///
/// The body is either a single envelope, an array of envelopes
/// (positional batch) or a keyed map of call triples (keyed batch).
/// Implementations do network I/O only; no retry policy is implied.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn send(&self, body: Value) -> Result<Value, RpcError>;
}
