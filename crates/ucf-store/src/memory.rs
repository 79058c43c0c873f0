//! In-memory device store used by tests and offline CLI runs.
//!
//! Implements the wire protocol of the remote store including the
//! device-side staging layer: mutations apply to a working copy and are
//! recorded as change rows; `changes` reports them and `commit` makes
//! the working copy durable. This is the server-side staging layer,
//! independent of the client overlay stacked on top of it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value as Json, json};
use tracing::debug;

use ucf_model::{SectionRecord, Value};
use ucf_rpc::{Endpoint, RpcError};

const STATUS_OK: i64 = 0;
const STATUS_INVALID_COMMAND: i64 = 2;
const STATUS_INVALID_ARGUMENT: i64 = 3;
const STATUS_NOT_FOUND: i64 = 4;
const STATUS_NO_DATA: i64 = 5;

type ConfigMap = BTreeMap<String, BTreeMap<String, SectionRecord>>;

#[derive(Debug, Default)]
struct State {
    committed: ConfigMap,
    working: ConfigMap,
    changes: BTreeMap<String, Vec<Vec<String>>>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one config namespace; sections get dense indexes in the
    /// given order. Seeded data counts as committed.
    pub fn with_config(self, config: &str, sections: Vec<SectionRecord>) -> Self {
        {
            let mut state = self.state.lock().expect("state lock");
            let mut map = BTreeMap::new();
            for (index, mut section) in sections.into_iter().enumerate() {
                section.index = index as i64;
                map.insert(section.id.clone(), section);
            }
            state.committed.insert(config.to_string(), map.clone());
            state.working.insert(config.to_string(), map);
        }
        self
    }

    /// Load the working state from a `{config: {sid: wire-object}}` dump.
    pub fn from_json(dump: &Json) -> Result<Self, String> {
        let backend = Self::new();
        {
            let mut state = backend.state.lock().expect("state lock");
            let configs = dump.as_object().ok_or("dump is not an object")?;
            for (config, sections) in configs {
                let sections = sections
                    .as_object()
                    .ok_or_else(|| format!("config '{config}' is not an object"))?;
                let mut map = BTreeMap::new();
                for (sid, raw) in sections {
                    let wire = raw
                        .as_object()
                        .ok_or_else(|| format!("section '{sid}' is not an object"))?;
                    let record = SectionRecord::from_wire(sid, wire).map_err(|e| e.to_string())?;
                    map.insert(sid.clone(), record);
                }
                state.committed.insert(config.clone(), map.clone());
                state.working.insert(config.clone(), map);
            }
        }
        Ok(backend)
    }

    /// Dump the working state as `{config: {sid: wire-object}}`.
    pub fn to_json(&self) -> Json {
        let state = self.state.lock().expect("state lock");
        let mut dump = Map::new();
        for (config, sections) in &state.working {
            let mut out = Map::new();
            for (sid, record) in sections {
                out.insert(sid.clone(), Json::Object(record.to_wire()));
            }
            dump.insert(config.clone(), Json::Object(out));
        }
        Json::Object(dump)
    }

    fn handle_call(&self, object: &str, function: &str, args: &Map<String, Json>) -> (i64, Option<Json>) {
        if object != "uci" {
            return (STATUS_NOT_FOUND, None);
        }

        let mut state = self.state.lock().expect("state lock");
        match function {
            "configs" => {
                let configs: Vec<&String> = state.working.keys().collect();
                (STATUS_OK, Some(json!({ "configs": configs })))
            }
            "get" => Self::handle_get(&state, args),
            "set" => Self::handle_set(&mut state, args),
            "add" => Self::handle_add(&mut state, args),
            "delete" => Self::handle_delete(&mut state, args),
            "order" => Self::handle_order(&mut state, args),
            "changes" => {
                let Some(config) = args.get("config").and_then(Json::as_str) else {
                    return (STATUS_INVALID_ARGUMENT, None);
                };
                let rows = state.changes.get(config).cloned().unwrap_or_default();
                (STATUS_OK, Some(json!({ "changes": rows })))
            }
            "commit" => {
                match args.get("config").and_then(Json::as_str) {
                    Some(config) => {
                        if let Some(working) = state.working.get(config).cloned() {
                            state.committed.insert(config.to_string(), working);
                        }
                        state.changes.remove(config);
                    }
                    None => {
                        state.committed = state.working.clone();
                        state.changes.clear();
                    }
                }
                (STATUS_OK, None)
            }
            _ => (STATUS_INVALID_COMMAND, None),
        }
    }

    fn handle_get(state: &State, args: &Map<String, Json>) -> (i64, Option<Json>) {
        let Some(config) = args.get("config").and_then(Json::as_str) else {
            return (STATUS_INVALID_ARGUMENT, None);
        };
        let Some(sections) = state.working.get(config) else {
            return (STATUS_NOT_FOUND, None);
        };

        if let Some(sid) = args.get("section").and_then(Json::as_str) {
            let Some(record) = sections.get(sid) else {
                return (STATUS_NO_DATA, None);
            };
            if let Some(option) = args.get("option").and_then(Json::as_str) {
                return match record.option(option) {
                    Some(value) => (STATUS_OK, Some(json!({ "value": value }))),
                    None => (STATUS_NO_DATA, None),
                };
            }
            return (STATUS_OK, Some(json!({ "values": record.to_wire() })));
        }

        let type_filter = args.get("type").and_then(Json::as_str);
        let mut values = Map::new();
        for (sid, record) in sections {
            if type_filter.is_some_and(|t| t != record.section_type) {
                continue;
            }
            values.insert(sid.clone(), Json::Object(record.to_wire()));
        }
        (STATUS_OK, Some(json!({ "values": values })))
    }

    fn handle_set(state: &mut State, args: &Map<String, Json>) -> (i64, Option<Json>) {
        let (Some(config), Some(sid), Some(values)) = (
            args.get("config").and_then(Json::as_str),
            args.get("section").and_then(Json::as_str),
            args.get("values").and_then(Json::as_object),
        ) else {
            return (STATUS_INVALID_ARGUMENT, None);
        };

        let config = config.to_string();
        let Some(record) = state
            .working
            .get_mut(&config)
            .and_then(|c| c.get_mut(sid))
        else {
            return (STATUS_NO_DATA, None);
        };

        let mut rows = Vec::new();
        for (option, raw) in values {
            let Ok(value) = serde_json::from_value::<Value>(raw.clone()) else {
                return (STATUS_INVALID_ARGUMENT, None);
            };
            rows.push(vec![
                "set".to_string(),
                sid.to_string(),
                option.clone(),
                value.as_scalar(),
            ]);
            record.options.insert(option.clone(), value);
        }
        state.changes.entry(config).or_default().extend(rows);
        (STATUS_OK, None)
    }

    fn handle_add(state: &mut State, args: &Map<String, Json>) -> (i64, Option<Json>) {
        let (Some(config), Some(section_type)) = (
            args.get("config").and_then(Json::as_str),
            args.get("type").and_then(Json::as_str),
        ) else {
            return (STATUS_INVALID_ARGUMENT, None);
        };
        let name = args.get("name").and_then(Json::as_str);

        let sid = match name {
            Some(name) => name.to_string(),
            None => {
                state.next_id += 1;
                format!("cfg{:06x}", state.next_id)
            }
        };

        let sections = state.working.entry(config.to_string()).or_default();
        let mut record = SectionRecord::new(sid.clone(), section_type);
        record.anonymous = name.is_none();
        record.index = sections.len() as i64;

        if let Some(values) = args.get("values").and_then(Json::as_object) {
            for (option, raw) in values {
                let Ok(value) = serde_json::from_value::<Value>(raw.clone()) else {
                    return (STATUS_INVALID_ARGUMENT, None);
                };
                record.options.insert(option.clone(), value);
            }
        }
        sections.insert(sid.clone(), record);

        state
            .changes
            .entry(config.to_string())
            .or_default()
            .push(vec!["add".to_string(), sid.clone(), section_type.to_string()]);
        (STATUS_OK, Some(json!({ "section": sid })))
    }

    fn handle_delete(state: &mut State, args: &Map<String, Json>) -> (i64, Option<Json>) {
        let Some(config) = args.get("config").and_then(Json::as_str) else {
            return (STATUS_INVALID_ARGUMENT, None);
        };
        let config = config.to_string();

        // Type-scoped form: delete every matching section of a type.
        if let Some(section_type) = args.get("type").and_then(Json::as_str) {
            let matching = args.get("match").and_then(Json::as_object);
            let Some(sections) = state.working.get_mut(&config) else {
                return (STATUS_NOT_FOUND, None);
            };
            let doomed: Vec<String> = sections
                .values()
                .filter(|s| s.section_type == section_type)
                .filter(|s| {
                    matching.is_none_or(|m| {
                        m.iter().all(|(option, expected)| {
                            s.option(option)
                                .map(|v| json!(v) == *expected)
                                .unwrap_or(false)
                        })
                    })
                })
                .map(|s| s.id.clone())
                .collect();
            for sid in &doomed {
                sections.remove(sid);
                state
                    .changes
                    .entry(config.clone())
                    .or_default()
                    .push(vec!["delete".to_string(), sid.clone()]);
            }
            return (STATUS_OK, None);
        }

        let Some(sid) = args.get("section").and_then(Json::as_str) else {
            return (STATUS_INVALID_ARGUMENT, None);
        };
        let Some(sections) = state.working.get_mut(&config) else {
            return (STATUS_NOT_FOUND, None);
        };

        let options: Option<Vec<String>> = if let Some(option) = args.get("option").and_then(Json::as_str)
        {
            Some(vec![option.to_string()])
        } else {
            args.get("options").and_then(Json::as_array).map(|items| {
                items
                    .iter()
                    .filter_map(Json::as_str)
                    .map(str::to_string)
                    .collect()
            })
        };

        match options {
            Some(options) => {
                let Some(record) = sections.get_mut(sid) else {
                    return (STATUS_NO_DATA, None);
                };
                for option in options {
                    record.options.remove(&option);
                    state.changes.entry(config.clone()).or_default().push(vec![
                        "delete".to_string(),
                        sid.to_string(),
                        option,
                    ]);
                }
            }
            None => {
                if sections.remove(sid).is_none() {
                    return (STATUS_NO_DATA, None);
                }
                state
                    .changes
                    .entry(config.clone())
                    .or_default()
                    .push(vec!["delete".to_string(), sid.to_string()]);
            }
        }
        (STATUS_OK, None)
    }

    fn handle_order(state: &mut State, args: &Map<String, Json>) -> (i64, Option<Json>) {
        let (Some(config), Some(order)) = (
            args.get("config").and_then(Json::as_str),
            args.get("sections").and_then(Json::as_array),
        ) else {
            return (STATUS_INVALID_ARGUMENT, None);
        };
        let config = config.to_string();
        let Some(sections) = state.working.get_mut(&config) else {
            return (STATUS_NOT_FOUND, None);
        };

        for (index, sid) in order.iter().filter_map(Json::as_str).enumerate() {
            if let Some(record) = sections.get_mut(sid) {
                record.index = index as i64;
                state.changes.entry(config.clone()).or_default().push(vec![
                    "order".to_string(),
                    sid.to_string(),
                    index.to_string(),
                ]);
            }
        }
        (STATUS_OK, None)
    }

    fn answer_envelope(&self, envelope: &Json) -> Result<Json, RpcError> {
        let obj = envelope
            .as_object()
            .ok_or_else(|| RpcError::Frame("request is not an object".into()))?;
        let id = obj
            .get("id")
            .cloned()
            .ok_or_else(|| RpcError::Frame("request has no id".into()))?;

        match obj.get("method").and_then(Json::as_str) {
            Some("call") => {
                let params = obj
                    .get("params")
                    .and_then(Json::as_array)
                    .ok_or_else(|| RpcError::Frame("call request has no params".into()))?;
                let object = params.get(1).and_then(Json::as_str).unwrap_or_default();
                let function = params.get(2).and_then(Json::as_str).unwrap_or_default();
                let empty = Map::new();
                let args = params.get(3).and_then(Json::as_object).unwrap_or(&empty);

                debug!(object, function, "memory backend call");
                let (status, payload) = self.handle_call(object, function, args);
                let result = match payload {
                    Some(payload) => json!([status, payload]),
                    None => json!([status]),
                };
                Ok(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
            }
            Some("list") => Ok(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "uci": {} },
            })),
            _ => Ok(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "method not found" },
            })),
        }
    }
}

#[async_trait]
impl Endpoint for MemoryBackend {
    async fn send(&self, body: Json) -> Result<Json, RpcError> {
        match body {
            Json::Array(envelopes) => {
                let mut answers = Vec::with_capacity(envelopes.len());
                for envelope in &envelopes {
                    answers.push(self.answer_envelope(envelope)?);
                }
                Ok(Json::Array(answers))
            }
            Json::Object(ref obj) if obj.contains_key("jsonrpc") => self.answer_envelope(&body),
            Json::Object(obj) => {
                // Keyed-map batch: key -> [object, function, args].
                let mut answers = Map::new();
                for (key, triple) in &obj {
                    let object = triple.get(0).and_then(Json::as_str).unwrap_or_default();
                    let function = triple.get(1).and_then(Json::as_str).unwrap_or_default();
                    let empty = Map::new();
                    let args = triple.get(2).and_then(Json::as_object).unwrap_or(&empty);
                    let (status, payload) = self.handle_call(object, function, args);
                    let result = match payload {
                        Some(payload) => json!([status, payload]),
                        None => json!([status]),
                    };
                    answers.insert(key.clone(), result);
                }
                Ok(Json::Object(answers))
            }
            _ => Err(RpcError::Frame("unsupported request body".into())),
        }
    }
}
