//! Baseline state loaded from the remote store.

use std::collections::BTreeMap;

use crate::section::SectionRecord;
use crate::value::Value;

/// Config name -> section id -> record. Loaded once per edit session
/// and never mutated by the editing layer; staged edits live in the
/// overlay on top of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    configs: BTreeMap<String, BTreeMap<String, SectionRecord>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_config(&mut self, config: impl Into<String>, sections: Vec<SectionRecord>) {
        let map = sections.into_iter().map(|s| (s.id.clone(), s)).collect();
        self.configs.insert(config.into(), map);
    }

    pub fn config(&self, config: &str) -> Option<&BTreeMap<String, SectionRecord>> {
        self.configs.get(config)
    }

    pub fn config_names(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    pub fn section(&self, config: &str, sid: &str) -> Option<&SectionRecord> {
        self.configs.get(config).and_then(|c| c.get(sid))
    }

    pub fn value(&self, config: &str, sid: &str, option: &str) -> Option<&Value> {
        self.section(config, sid).and_then(|s| s.option(option))
    }

    pub fn contains_section(&self, config: &str, sid: &str) -> bool {
        self.section(config, sid).is_some()
    }

    /// Sections of one config in baseline order.
    pub fn ordered_sections(&self, config: &str) -> Vec<&SectionRecord> {
        let mut sections: Vec<&SectionRecord> = self
            .configs
            .get(config)
            .map(|c| c.values().collect())
            .unwrap_or_default();
        sections.sort_by_key(|s| s.index);
        sections
    }
}
