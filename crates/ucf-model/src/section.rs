//! Section records and the temporary-id convention.
//!
//! On the wire a section is a flat JSON object whose reserved keys start
//! with a dot (`.name`, `.type`, `.anonymous`, `.index`, `.create`) and
//! whose remaining keys are options. The dotted keys never collide with
//! option names because the store rejects option names starting with a dot.

use std::collections::BTreeMap;

use serde_json::{Map, json};

use crate::error::ModelError;
use crate::value::Value;

/// Prefix of locally allocated section ids for sections that have not
/// been confirmed by the remote store yet. Backend-assigned ids are
/// opaque alphanumerics and can never start with a dot.
pub const TEMP_ID_PREFIX: &str = ".new.";

/// Returns true if `sid` is a locally allocated temporary section id.
pub fn is_temp_id(sid: &str) -> bool {
    sid.starts_with(TEMP_ID_PREFIX)
}

/// One entry of a config namespace: type tag, position and options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRecord {
    /// Section id (backend-assigned, or temporary for staged creates).
    pub id: String,
    /// Type tag of the section.
    pub section_type: String,
    /// Requested name for a named create; None for anonymous sections.
    pub create_name: Option<String>,
    pub anonymous: bool,
    /// Position within the config namespace.
    pub index: i64,
    pub options: BTreeMap<String, Value>,
}

impl SectionRecord {
    pub fn new(id: impl Into<String>, section_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            section_type: section_type.into(),
            create_name: None,
            anonymous: true,
            index: 0,
            options: BTreeMap::new(),
        }
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// Decode a wire object into a record. `id` is the key the object was
    /// filed under in the enclosing values map.
    pub fn from_wire(id: &str, wire: &Map<String, serde_json::Value>) -> Result<Self, ModelError> {
        let section_type = wire
            .get(".type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ModelError::MissingType(id.to_string()))?
            .to_string();

        let mut record = Self::new(id, section_type);

        record.anonymous = wire
            .get(".anonymous")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true);
        record.index = wire
            .get(".index")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        record.create_name = wire
            .get(".create")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        for (key, raw) in wire {
            if key.starts_with('.') {
                continue;
            }
            let value: Value =
                serde_json::from_value(raw.clone()).map_err(|_| ModelError::InvalidOption {
                    section: id.to_string(),
                    option: key.clone(),
                })?;
            record.options.insert(key.clone(), value);
        }

        Ok(record)
    }

    /// Encode the record back into the flat wire object.
    pub fn to_wire(&self) -> Map<String, serde_json::Value> {
        let mut wire = Map::new();
        wire.insert(".name".into(), json!(self.id));
        wire.insert(".type".into(), json!(self.section_type));
        wire.insert(".anonymous".into(), json!(self.anonymous));
        wire.insert(".index".into(), json!(self.index));
        if let Some(name) = &self.create_name {
            wire.insert(".create".into(), json!(name));
        }
        for (key, value) in &self.options {
            wire.insert(key.clone(), serde_json::to_value(value).unwrap_or_default());
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_type_is_rejected() {
        let wire = Map::from_iter([("proto".to_string(), json!("dhcp"))]);
        let err = SectionRecord::from_wire("lan", &wire).unwrap_err();
        assert!(matches!(err, ModelError::MissingType(sid) if sid == "lan"));
    }

    #[test]
    fn dotted_keys_are_metadata_not_options() {
        let wire = Map::from_iter([
            (".type".to_string(), json!("interface")),
            (".index".to_string(), json!(3)),
            ("proto".to_string(), json!("dhcp")),
        ]);
        let record = SectionRecord::from_wire("lan", &wire).unwrap();
        assert_eq!(record.index, 3);
        assert_eq!(record.options.len(), 1);
        assert_eq!(record.option("proto"), Some(&Value::from("dhcp")));
    }
}
