//! Batch correlation and frame handling tests.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};
use ucf_rpc::{CallSpec, Endpoint, Outcome, RpcClient, RpcError};

/// Endpoint that answers every call with a canned payload derived from
/// its arguments, optionally reversing the response array.
struct EchoEndpoint {
    reverse: bool,
    requests: Mutex<Vec<Value>>,
}

impl EchoEndpoint {
    fn new(reverse: bool) -> Self {
        Self {
            reverse,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn answer(envelope: &Value) -> Value {
        let id = envelope["id"].as_u64().unwrap();
        let function = envelope["params"][2].as_str().unwrap();
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": [0, {"echo": function}],
        })
    }
}

#[async_trait]
impl Endpoint for EchoEndpoint {
    async fn send(&self, body: Value) -> Result<Value, RpcError> {
        self.requests.lock().unwrap().push(body.clone());
        match body {
            Value::Array(envelopes) => {
                let mut answers: Vec<Value> = envelopes.iter().map(Self::answer).collect();
                if self.reverse {
                    answers.reverse();
                }
                Ok(Value::Array(answers))
            }
            envelope => Ok(Self::answer(&envelope)),
        }
    }
}

fn spec(function: &str) -> CallSpec {
    CallSpec::new("uci", function)
}

#[tokio::test]
async fn singleton_call_round_trips() {
    let client = RpcClient::new(Arc::new(EchoEndpoint::new(false)), "sid");
    let outcome = client.call(spec("get")).await.unwrap();
    assert_eq!(outcome, Outcome::Data(json!({"echo": "get"})));
}

#[tokio::test]
async fn batch_resolves_in_queued_order_despite_reordered_response() {
    let client = RpcClient::new(Arc::new(EchoEndpoint::new(true)), "sid");

    client.open_batch().unwrap();
    let a = client.queue(spec("first")).unwrap();
    let b = client.queue(spec("second")).unwrap();
    let c = client.queue(spec("third")).unwrap();
    client.flush_batch().await.unwrap();

    assert_eq!(a.wait().await.unwrap(), Outcome::Data(json!({"echo": "first"})));
    assert_eq!(b.wait().await.unwrap(), Outcome::Data(json!({"echo": "second"})));
    assert_eq!(c.wait().await.unwrap(), Outcome::Data(json!({"echo": "third"})));
}

#[tokio::test]
async fn batch_sends_one_wire_request() {
    let endpoint = Arc::new(EchoEndpoint::new(false));
    let client = RpcClient::new(endpoint.clone(), "sid");

    client.open_batch().unwrap();
    let a = client.queue(spec("a")).unwrap();
    let b = client.queue(spec("b")).unwrap();
    client.flush_batch().await.unwrap();
    a.wait().await.unwrap();
    b.wait().await.unwrap();

    let requests = endpoint.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn second_open_batch_is_rejected() {
    let client = RpcClient::new(Arc::new(EchoEndpoint::new(false)), "sid");
    client.open_batch().unwrap();
    assert!(matches!(
        client.open_batch(),
        Err(RpcError::BatchAlreadyOpen)
    ));
}

#[tokio::test]
async fn queue_without_batch_is_rejected() {
    let client = RpcClient::new(Arc::new(EchoEndpoint::new(false)), "sid");
    assert!(matches!(
        client.queue(spec("get")),
        Err(RpcError::NoBatchOpen)
    ));
}

#[tokio::test]
async fn flush_without_batch_is_empty() {
    let client = RpcClient::new(Arc::new(EchoEndpoint::new(false)), "sid");
    client.flush_batch().await.unwrap();
}

/// Endpoint that answers a keyed batch with raw result arrays per key.
struct KeyedEndpoint;

#[async_trait]
impl Endpoint for KeyedEndpoint {
    async fn send(&self, body: Value) -> Result<Value, RpcError> {
        let map = body.as_object().expect("keyed body");
        let mut answers = serde_json::Map::new();
        for (key, triple) in map {
            let function = triple[1].as_str().unwrap();
            answers.insert(key.clone(), json!([0, {"echo": function}]));
        }
        Ok(Value::Object(answers))
    }
}

#[tokio::test]
async fn keyed_batch_correlates_by_key() {
    let client = RpcClient::new(Arc::new(KeyedEndpoint), "sid");

    client.open_batch().unwrap();
    let a = client.queue_keyed("alpha", spec("one")).unwrap();
    let b = client.queue_keyed("beta", spec("two")).unwrap();
    client.flush_batch_keyed().await.unwrap();

    assert_eq!(a.wait().await.unwrap(), Outcome::Data(json!({"echo": "one"})));
    assert_eq!(b.wait().await.unwrap(), Outcome::Data(json!({"echo": "two"})));
}

/// Endpoint that mangles the frame of the second response item.
struct MangledEndpoint;

#[async_trait]
impl Endpoint for MangledEndpoint {
    async fn send(&self, body: Value) -> Result<Value, RpcError> {
        let envelopes = body.as_array().expect("batch body");
        let good = json!({
            "jsonrpc": "2.0",
            "id": envelopes[0]["id"],
            "result": [0, "ok"],
        });
        // Version tag missing, id intact: fatal for that call only.
        let bad = json!({"id": envelopes[1]["id"], "result": [0, "bad"]});
        Ok(json!([good, bad]))
    }
}

#[tokio::test]
async fn malformed_frame_fails_only_its_own_call() {
    let client = RpcClient::new(Arc::new(MangledEndpoint), "sid");

    client.open_batch().unwrap();
    let a = client.queue(spec("a")).unwrap();
    let b = client.queue(spec("b")).unwrap();
    client.flush_batch().await.unwrap();

    assert_eq!(a.wait().await.unwrap(), Outcome::Data(json!("ok")));
    assert!(matches!(b.wait().await, Err(RpcError::Frame(_))));
}

/// Endpoint answering with a correlation id nobody asked for.
struct StrayEndpoint;

#[async_trait]
impl Endpoint for StrayEndpoint {
    async fn send(&self, _body: Value) -> Result<Value, RpcError> {
        Ok(json!({"jsonrpc": "2.0", "id": 999_999u64, "result": [0]}))
    }
}

#[tokio::test]
async fn unmatched_correlation_id_is_fatal_for_singleton() {
    let client = RpcClient::new(Arc::new(StrayEndpoint), "sid");
    assert!(matches!(
        client.call(spec("get")).await,
        Err(RpcError::NoRelatedRequest(999_999))
    ));
}

#[tokio::test]
async fn list_returns_the_object_directory() {
    struct DirectoryEndpoint;

    #[async_trait]
    impl Endpoint for DirectoryEndpoint {
        async fn send(&self, body: Value) -> Result<Value, RpcError> {
            assert_eq!(body["method"], "list");
            assert_eq!(body["params"], json!(["uci"]));
            Ok(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": {"uci": {"get": {}, "set": {}}},
            }))
        }
    }

    let client = RpcClient::new(Arc::new(DirectoryEndpoint), "sid");
    let directory = client.list(&["uci"]).await.unwrap();
    assert!(directory["uci"].get("get").is_some());
}

#[tokio::test]
async fn no_data_status_is_not_an_error() {
    struct NoDataEndpoint;

    #[async_trait]
    impl Endpoint for NoDataEndpoint {
        async fn send(&self, body: Value) -> Result<Value, RpcError> {
            Ok(json!({"jsonrpc": "2.0", "id": body["id"], "result": [4]}))
        }
    }

    let client = RpcClient::new(Arc::new(NoDataEndpoint), "sid");
    let outcome = client.call(spec("get")).await.unwrap();
    assert_eq!(outcome, Outcome::NoData(4));
    assert!(outcome.is_no_data());
}
