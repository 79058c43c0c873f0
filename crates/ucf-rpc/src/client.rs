//! Request-multiplexing client over an [`Endpoint`].
//!
//! With no batch open, calls are sent immediately as singleton requests.
//! `open_batch` switches the client into a collection window: queued
//! calls return a [`PendingCall`] placeholder and `flush_batch` (or
//! `flush_batch_keyed`) sends everything as one wire request, resolving
//! the placeholders in queued order regardless of how the remote side
//! ordered the response items.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::channel::oneshot;
use serde_json::Value;
use tracing::{debug, warn};

use crate::envelope::{CallSpec, Outcome, ResponseFrame, decode_result, list_envelope};
use crate::error::RpcError;
use crate::transport::Endpoint;

/// Placeholder result for a queued call, resolved at flush time.
#[derive(Debug)]
pub struct PendingCall {
    rx: oneshot::Receiver<Result<Outcome, RpcError>>,
}

impl PendingCall {
    /// Wait for the batch flush to resolve this call. If the batch
    /// failed as a whole before resolution, yields `BatchFailed`.
    pub async fn wait(self) -> Result<Outcome, RpcError> {
        match self.rx.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(RpcError::BatchFailed),
        }
    }
}

struct Queued {
    id: u64,
    key: String,
    spec: CallSpec,
    tx: oneshot::Sender<Result<Outcome, RpcError>>,
}

pub struct RpcClient {
    endpoint: Arc<dyn Endpoint>,
    session: String,
    next_id: AtomicU64,
    batch: Mutex<Option<Vec<Queued>>>,
}

impl RpcClient {
    pub fn new(endpoint: Arc<dyn Endpoint>, session: impl Into<String>) -> Self {
        Self {
            endpoint,
            session: session.into(),
            next_id: AtomicU64::new(1),
            batch: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Begin a collection window. Only one window may be open at a time;
    /// opening a second is a programming error, not a silent merge.
    pub fn open_batch(&self) -> Result<(), RpcError> {
        let mut batch = self.batch.lock().expect("batch lock");
        if batch.is_some() {
            return Err(RpcError::BatchAlreadyOpen);
        }
        *batch = Some(Vec::new());
        Ok(())
    }

    pub fn batch_open(&self) -> bool {
        self.batch.lock().expect("batch lock").is_some()
    }

    /// Queue a call into the open batch, keyed by its sequence index.
    pub fn queue(&self, spec: CallSpec) -> Result<PendingCall, RpcError> {
        let mut guard = self.batch.lock().expect("batch lock");
        let queue = guard.as_mut().ok_or(RpcError::NoBatchOpen)?;
        let key = queue.len().to_string();
        Self::push(queue, self.allocate_id(), key, spec)
    }

    /// Queue a call under a caller-chosen key for the keyed-map wire
    /// convention.
    pub fn queue_keyed(&self, key: impl Into<String>, spec: CallSpec) -> Result<PendingCall, RpcError> {
        let mut guard = self.batch.lock().expect("batch lock");
        let queue = guard.as_mut().ok_or(RpcError::NoBatchOpen)?;
        Self::push(queue, self.allocate_id(), key.into(), spec)
    }

    fn push(
        queue: &mut Vec<Queued>,
        id: u64,
        key: String,
        spec: CallSpec,
    ) -> Result<PendingCall, RpcError> {
        let (tx, rx) = oneshot::channel();
        queue.push(Queued { id, key, spec, tx });
        Ok(PendingCall { rx })
    }

    /// Send the queued calls as one positional wire request and resolve
    /// every placeholder, matching response items to queued descriptors
    /// by correlation id.
    pub async fn flush_batch(&self) -> Result<(), RpcError> {
        let Some(queue) = self.batch.lock().expect("batch lock").take() else {
            return Ok(());
        };
        if queue.is_empty() {
            return Ok(());
        }

        let body: Vec<Value> = queue
            .iter()
            .map(|q| q.spec.to_envelope(q.id, &self.session))
            .collect();

        debug!(calls = queue.len(), "flushing positional batch");
        let response = self.endpoint.send(Value::Array(body)).await?;

        // A single queued call may legitimately come back as a bare
        // object instead of a one-element array.
        let items: Vec<Value> = match response {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut results: HashMap<u64, Result<Outcome, RpcError>> = HashMap::new();
        let mut stray = None;

        for item in &items {
            match ResponseFrame::parse(item) {
                Ok(frame) => {
                    if queue.iter().any(|q| q.id == frame.id) {
                        results.insert(frame.id, Ok(frame.outcome));
                    } else {
                        warn!(id = frame.id, "response for unknown request id");
                        stray = Some(RpcError::NoRelatedRequest(frame.id));
                    }
                }
                Err(err) => {
                    // Malformed frames that still carry an id are fatal
                    // for that call alone.
                    if let Some(id) = item.get("id").and_then(Value::as_u64) {
                        results.insert(id, Err(err));
                    } else {
                        warn!(%err, "unattributable malformed response frame");
                        stray = Some(err);
                    }
                }
            }
        }

        // Resolve placeholders in queued order.
        for queued in queue {
            let result = results
                .remove(&queued.id)
                .unwrap_or_else(|| Err(RpcError::Frame("no response for queued call".into())));
            let _ = queued.tx.send(result);
        }

        match stray {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Send the queued calls as one keyed-map wire request and resolve
    /// every placeholder, matching response items by key.
    pub async fn flush_batch_keyed(&self) -> Result<(), RpcError> {
        let Some(queue) = self.batch.lock().expect("batch lock").take() else {
            return Ok(());
        };
        if queue.is_empty() {
            return Ok(());
        }

        let mut body = serde_json::Map::new();
        for queued in &queue {
            body.insert(queued.key.clone(), queued.spec.to_triple());
        }

        debug!(calls = queue.len(), "flushing keyed batch");
        let response = self.endpoint.send(Value::Object(body)).await?;

        let map = match response {
            Value::Object(map) => map,
            _ => {
                let err = RpcError::Frame("keyed response is not an object".into());
                for queued in queue {
                    let _ = queued
                        .tx
                        .send(Err(RpcError::Frame("keyed response is not an object".into())));
                }
                return Err(err);
            }
        };

        let mut stray = None;
        for key in map.keys() {
            if !queue.iter().any(|q| q.key == *key) {
                warn!(key, "response for unknown batch key");
                stray = Some(RpcError::UnmatchedKey(key.clone()));
            }
        }

        for queued in queue {
            let result = match map.get(&queued.key) {
                Some(item) => decode_result(Some(item)),
                None => Err(RpcError::Frame("no response for queued call".into())),
            };
            let _ = queued.tx.send(result);
        }

        match stray {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Issue a singleton call outside any batch window.
    pub async fn call(&self, spec: CallSpec) -> Result<Outcome, RpcError> {
        let id = self.allocate_id();
        let envelope = spec.to_envelope(id, &self.session);

        debug!(object = %spec.object, function = %spec.function, "singleton call");
        let response = self.endpoint.send(envelope).await?;
        let frame = ResponseFrame::parse(&response)?;

        if frame.id != id {
            return Err(RpcError::NoRelatedRequest(frame.id));
        }
        Ok(frame.outcome)
    }

    /// Capability discovery against the remote object directory.
    pub async fn list(&self, patterns: &[&str]) -> Result<Value, RpcError> {
        let id = self.allocate_id();
        let envelope = list_envelope(id, patterns);

        let response = self.endpoint.send(envelope).await?;
        let obj = response
            .as_object()
            .ok_or_else(|| RpcError::Frame("response is not an object".into()))?;
        if obj.get("jsonrpc").and_then(Value::as_str) != Some(crate::envelope::PROTOCOL_VERSION)
            || obj.get("id").and_then(Value::as_u64).is_none()
        {
            return Err(RpcError::Frame("missing expected discriminators".into()));
        }
        Ok(obj.get("result").cloned().unwrap_or(Value::Null))
    }
}
