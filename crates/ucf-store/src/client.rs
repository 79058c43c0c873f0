//! Typed operations against the remote `uci` config store object.
//!
//! Every operation is a thin request built on the batching transport.
//! Reads decode a non-zero remote status to `None` ("no data"), which is
//! deliberately distinct from a present-but-empty collection; mutations
//! map a non-zero status to [`StoreError::Status`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value as Json, json};
use tracing::debug;

use ucf_model::{SectionRecord, Value};
use ucf_rpc::{CallSpec, Outcome, PendingCall, RpcClient};

use crate::error::{Result, StoreError};

/// Remote object name all store operations target.
const STORE_OBJECT: &str = "uci";

/// What to delete within a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteSpec {
    /// Remove the whole section.
    Section,
    /// Remove one option.
    Option(String),
    /// Remove a list of options.
    Options(Vec<String>),
}

/// A queued store call whose result decodes to `T` after flush.
pub struct Pending<T> {
    call: PendingCall,
    decode: Box<dyn FnOnce(Outcome) -> Result<T> + Send>,
}

impl<T> Pending<T> {
    pub async fn wait(self) -> Result<T> {
        let outcome = self.call.wait().await?;
        (self.decode)(outcome)
    }
}

#[derive(Clone)]
pub struct StoreClient {
    rpc: Arc<RpcClient>,
}

impl StoreClient {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Open a batch window on the underlying transport and return the
    /// typed queueing facade for it.
    pub fn batch(&self) -> Result<StoreBatch<'_>> {
        self.rpc.open_batch()?;
        Ok(StoreBatch { client: self })
    }

    /// Option value, or the section's type tag when `option` is omitted.
    pub async fn get(
        &self,
        config: &str,
        section: &str,
        option: Option<&str>,
    ) -> Result<Option<Value>> {
        let outcome = self.rpc.call(spec_get(config, section, option)).await?;
        decode_get(outcome, option.is_some())
    }

    /// All sections of a config namespace, annotated with id and type,
    /// sorted by position. `None` means the remote store had no data for
    /// this config.
    pub async fn get_all(&self, config: &str) -> Result<Option<Vec<SectionRecord>>> {
        let outcome = self.rpc.call(spec_get_all(config, None)).await?;
        decode_get_all(outcome)
    }

    /// One section's full record.
    pub async fn get_section(&self, config: &str, section: &str) -> Result<Option<SectionRecord>> {
        let outcome = self.rpc.call(spec_get_all(config, Some(section))).await?;
        decode_get_section(outcome, section)
    }

    /// Create a new section remotely; returns the assigned section id.
    pub async fn add(
        &self,
        config: &str,
        section_type: &str,
        name: Option<&str>,
        values: Option<&BTreeMap<String, Value>>,
    ) -> Result<String> {
        let outcome = self
            .rpc
            .call(spec_add(config, section_type, name, values))
            .await?;
        decode_added(outcome)
    }

    pub async fn set_option(
        &self,
        config: &str,
        section: &str,
        option: &str,
        value: &Value,
    ) -> Result<()> {
        let mut values = BTreeMap::new();
        values.insert(option.to_string(), value.clone());
        self.set_values(config, section, &values).await
    }

    pub async fn set_values(
        &self,
        config: &str,
        section: &str,
        values: &BTreeMap<String, Value>,
    ) -> Result<()> {
        let outcome = self.rpc.call(spec_set(config, section, values)).await?;
        decode_unit(outcome)
    }

    /// The value-less `set` overload: create (or re-type) a named
    /// section. Wire-wise this is an `add` with an explicit name.
    pub async fn create_named(&self, config: &str, section_type: &str, name: &str) -> Result<String> {
        self.add(config, section_type, Some(name), None).await
    }

    pub async fn delete(&self, config: &str, section: &str, what: DeleteSpec) -> Result<()> {
        let outcome = self.rpc.call(spec_delete(config, section, &what)).await?;
        decode_unit(outcome)
    }

    /// Delete every section of a type, optionally narrowed by a match
    /// on option values.
    pub async fn delete_all(
        &self,
        config: &str,
        section_type: &str,
        matching: Option<&BTreeMap<String, Value>>,
    ) -> Result<()> {
        let outcome = self
            .rpc
            .call(spec_delete_all(config, section_type, matching))
            .await?;
        decode_unit(outcome)
    }

    /// Persist a new section ordering.
    pub async fn order(&self, config: &str, sections: &[String]) -> Result<()> {
        let outcome = self.rpc.call(spec_order(config, sections)).await?;
        decode_unit(outcome)
    }

    /// Config namespaces known to the store.
    pub async fn configs(&self) -> Result<Vec<String>> {
        let outcome = self.rpc.call(spec_configs()).await?;
        decode_configs(outcome)
    }

    /// Pending server-side changes for one config.
    pub async fn changes(&self, config: &str) -> Result<Vec<Vec<String>>> {
        let outcome = self.rpc.call(spec_changes(config)).await?;
        decode_changes(outcome)
    }

    /// Pending server-side changes across all configs, gathered with a
    /// single batch round-trip. Configs without changes are omitted.
    pub async fn changes_all(&self) -> Result<BTreeMap<String, Vec<Vec<String>>>> {
        let configs = self.configs().await?;

        let batch = self.batch()?;
        let mut pending = Vec::with_capacity(configs.len());
        for config in &configs {
            pending.push(batch.changes(config)?);
        }
        batch.flush().await?;

        let mut all = BTreeMap::new();
        for (config, call) in configs.into_iter().zip(pending) {
            let rows = call.wait().await?;
            if !rows.is_empty() {
                all.insert(config, rows);
            }
        }
        Ok(all)
    }

    /// Make server-side staged writes durable.
    pub async fn commit(&self, config: Option<&str>) -> Result<()> {
        let outcome = self.rpc.call(spec_commit(config)).await?;
        decode_unit(outcome)
    }
}

/// Typed queueing facade over an open transport batch.
pub struct StoreBatch<'a> {
    client: &'a StoreClient,
}

impl StoreBatch<'_> {
    fn queue<T: 'static>(
        &self,
        spec: CallSpec,
        decode: impl FnOnce(Outcome) -> Result<T> + Send + 'static,
    ) -> Result<Pending<T>> {
        let call = self.client.rpc.queue(spec)?;
        Ok(Pending {
            call,
            decode: Box::new(decode),
        })
    }

    pub fn get_all(&self, config: &str) -> Result<Pending<Option<Vec<SectionRecord>>>> {
        self.queue(spec_get_all(config, None), decode_get_all)
    }

    pub fn add(
        &self,
        config: &str,
        section_type: &str,
        name: Option<&str>,
        values: Option<&BTreeMap<String, Value>>,
    ) -> Result<Pending<String>> {
        self.queue(spec_add(config, section_type, name, values), decode_added)
    }

    pub fn set_values(
        &self,
        config: &str,
        section: &str,
        values: &BTreeMap<String, Value>,
    ) -> Result<Pending<()>> {
        self.queue(spec_set(config, section, values), decode_unit)
    }

    pub fn delete(&self, config: &str, section: &str, what: &DeleteSpec) -> Result<Pending<()>> {
        self.queue(spec_delete(config, section, what), decode_unit)
    }

    pub fn order(&self, config: &str, sections: &[String]) -> Result<Pending<()>> {
        self.queue(spec_order(config, sections), decode_unit)
    }

    pub fn changes(&self, config: &str) -> Result<Pending<Vec<Vec<String>>>> {
        self.queue(spec_changes(config), decode_changes)
    }

    pub async fn flush(self) -> Result<()> {
        debug!("flushing store batch");
        self.client.rpc.flush_batch().await?;
        Ok(())
    }
}

fn spec_get(config: &str, section: &str, option: Option<&str>) -> CallSpec {
    let mut spec = CallSpec::new(STORE_OBJECT, "get")
        .arg("config", json!(config))
        .arg("section", json!(section));
    if let Some(option) = option {
        spec = spec.arg("option", json!(option));
    }
    spec
}

fn spec_get_all(config: &str, section: Option<&str>) -> CallSpec {
    let mut spec = CallSpec::new(STORE_OBJECT, "get").arg("config", json!(config));
    if let Some(section) = section {
        spec = spec.arg("section", json!(section));
    }
    spec
}

fn spec_add(
    config: &str,
    section_type: &str,
    name: Option<&str>,
    values: Option<&BTreeMap<String, Value>>,
) -> CallSpec {
    let mut spec = CallSpec::new(STORE_OBJECT, "add")
        .arg("config", json!(config))
        .arg("type", json!(section_type));
    if let Some(name) = name {
        spec = spec.arg("name", json!(name));
    }
    if let Some(values) = values {
        spec = spec.arg("values", json!(values));
    }
    spec
}

fn spec_set(config: &str, section: &str, values: &BTreeMap<String, Value>) -> CallSpec {
    CallSpec::new(STORE_OBJECT, "set")
        .arg("config", json!(config))
        .arg("section", json!(section))
        .arg("values", json!(values))
}

fn spec_delete(config: &str, section: &str, what: &DeleteSpec) -> CallSpec {
    let mut spec = CallSpec::new(STORE_OBJECT, "delete")
        .arg("config", json!(config))
        .arg("section", json!(section));
    match what {
        DeleteSpec::Section => {}
        DeleteSpec::Option(option) => {
            spec = spec.arg("option", json!(option));
        }
        DeleteSpec::Options(options) => {
            spec = spec.arg("options", json!(options));
        }
    }
    spec
}

fn spec_delete_all(
    config: &str,
    section_type: &str,
    matching: Option<&BTreeMap<String, Value>>,
) -> CallSpec {
    let mut spec = CallSpec::new(STORE_OBJECT, "delete")
        .arg("config", json!(config))
        .arg("type", json!(section_type));
    if let Some(matching) = matching {
        spec = spec.arg("match", json!(matching));
    }
    spec
}

fn spec_order(config: &str, sections: &[String]) -> CallSpec {
    CallSpec::new(STORE_OBJECT, "order")
        .arg("config", json!(config))
        .arg("sections", json!(sections))
}

fn spec_changes(config: &str) -> CallSpec {
    CallSpec::new(STORE_OBJECT, "changes").arg("config", json!(config))
}

fn spec_commit(config: Option<&str>) -> CallSpec {
    let mut spec = CallSpec::new(STORE_OBJECT, "commit");
    if let Some(config) = config {
        spec = spec.arg("config", json!(config));
    }
    spec
}

fn spec_configs() -> CallSpec {
    CallSpec::new(STORE_OBJECT, "configs")
}

fn decode_unit(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Data(_) => Ok(()),
        Outcome::NoData(status) => Err(StoreError::Status(status)),
    }
}

fn decode_added(outcome: Outcome) -> Result<String> {
    match outcome {
        Outcome::Data(payload) => payload
            .get("section")
            .and_then(Json::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Decode("add response has no section id".into())),
        Outcome::NoData(status) => Err(StoreError::Status(status)),
    }
}

fn decode_get(outcome: Outcome, option_requested: bool) -> Result<Option<Value>> {
    let Outcome::Data(payload) = outcome else {
        return Ok(None);
    };

    if option_requested {
        match payload.get("value") {
            Some(raw) => {
                let value: Value = serde_json::from_value(raw.clone())
                    .map_err(|_| StoreError::Decode("option value is not a string or list".into()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    } else {
        // Option omitted: the caller asked for the section's type tag.
        let tag = payload
            .get("values")
            .and_then(|v| v.get(".type"))
            .and_then(Json::as_str)
            .map(|t| Value::from(t.to_string()));
        Ok(tag)
    }
}

fn decode_get_all(outcome: Outcome) -> Result<Option<Vec<SectionRecord>>> {
    let Outcome::Data(payload) = outcome else {
        return Ok(None);
    };

    let values = payload
        .get("values")
        .and_then(Json::as_object)
        .ok_or_else(|| StoreError::Decode("get response has no values member".into()))?;

    let mut sections = Vec::with_capacity(values.len());
    for (sid, raw) in values {
        let wire = raw
            .as_object()
            .ok_or_else(|| StoreError::Decode(format!("section '{sid}' is not an object")))?;
        sections.push(SectionRecord::from_wire(sid, wire)?);
    }
    sections.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
    Ok(Some(sections))
}

fn decode_get_section(outcome: Outcome, section: &str) -> Result<Option<SectionRecord>> {
    let Outcome::Data(payload) = outcome else {
        return Ok(None);
    };

    let values = payload
        .get("values")
        .and_then(Json::as_object)
        .ok_or_else(|| StoreError::Decode("get response has no values member".into()))?;
    Ok(Some(SectionRecord::from_wire(section, values)?))
}

fn decode_configs(outcome: Outcome) -> Result<Vec<String>> {
    let Outcome::Data(payload) = outcome else {
        return Ok(Vec::new());
    };
    let configs = payload
        .get("configs")
        .and_then(Json::as_array)
        .ok_or_else(|| StoreError::Decode("configs response has no configs member".into()))?;
    Ok(configs
        .iter()
        .filter_map(Json::as_str)
        .map(str::to_string)
        .collect())
}

fn decode_changes(outcome: Outcome) -> Result<Vec<Vec<String>>> {
    let Outcome::Data(payload) = outcome else {
        return Ok(Vec::new());
    };
    let rows = payload
        .get("changes")
        .and_then(Json::as_array)
        .ok_or_else(|| StoreError::Decode("changes response has no changes member".into()))?;
    Ok(rows
        .iter()
        .filter_map(Json::as_array)
        .map(|row| {
            row.iter()
                .filter_map(Json::as_str)
                .map(str::to_string)
                .collect()
        })
        .collect())
}
