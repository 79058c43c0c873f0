//! The overlay: staged, not-yet-committed edits on top of a snapshot.
//!
//! Four independent ledgers keyed by config name record creates,
//! changes, deletes and reordering. Effective values resolve with the
//! fixed precedence deletes > changes > creates-exclusivity > baseline.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use ucf_model::{SectionRecord, Snapshot, TEMP_ID_PREFIX, Value, is_temp_id};

/// A staged section creation, identified by a temporary id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRecord {
    pub section_type: String,
    /// Requested name; None creates an anonymous section.
    pub name: Option<String>,
    /// Position used when merging with baseline sections.
    pub index: i64,
    pub values: BTreeMap<String, Value>,
}

/// A staged deletion: the whole section, or a set of its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRecord {
    Section,
    Options(BTreeSet<String>),
}

#[derive(Debug, Clone, Default)]
pub struct Overlay {
    next_id: u64,
    creates: BTreeMap<String, BTreeMap<String, CreateRecord>>,
    changes: BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>,
    deletes: BTreeMap<String, BTreeMap<String, DeleteRecord>>,
    /// Staged position overrides, set by `stage_reorder`.
    indexes: BTreeMap<String, BTreeMap<String, i64>>,
    reorder: bool,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.creates.values().all(BTreeMap::is_empty)
            && self.changes.values().all(BTreeMap::is_empty)
            && self.deletes.values().all(BTreeMap::is_empty)
            && !self.reorder
    }

    pub fn reorder_pending(&self) -> bool {
        self.reorder
    }

    pub(crate) fn creates(&self) -> &BTreeMap<String, BTreeMap<String, CreateRecord>> {
        &self.creates
    }

    pub(crate) fn changes(&self) -> &BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>> {
        &self.changes
    }

    pub(crate) fn deletes(&self) -> &BTreeMap<String, BTreeMap<String, DeleteRecord>> {
        &self.deletes
    }

    /// Effective value of `(config, section, option)` under this overlay.
    ///
    /// Temporary sections resolve exclusively from their create record;
    /// for baseline sections deletes dominate changes, changes dominate
    /// the snapshot.
    pub fn resolve<'a>(
        &'a self,
        snapshot: &'a Snapshot,
        config: &str,
        section: &str,
        option: &str,
    ) -> Option<&'a Value> {
        if is_temp_id(section) {
            return self
                .creates
                .get(config)
                .and_then(|c| c.get(section))
                .and_then(|record| record.values.get(option));
        }

        if let Some(record) = self.deletes.get(config).and_then(|c| c.get(section)) {
            match record {
                DeleteRecord::Section => return None,
                DeleteRecord::Options(options) if options.contains(option) => return None,
                DeleteRecord::Options(_) => {}
            }
        }

        if let Some(value) = self
            .changes
            .get(config)
            .and_then(|c| c.get(section))
            .and_then(|opts| opts.get(option))
        {
            return Some(value);
        }

        snapshot.value(config, section, option)
    }

    /// Stage an option write. A `None` value behaves as a delete; a set
    /// on a section already staged for whole-section deletion is a
    /// no-op (the delete wins).
    pub fn stage_set(&mut self, config: &str, section: &str, option: &str, value: Option<Value>) {
        let Some(value) = value else {
            self.stage_delete(config, section, Some(option));
            return;
        };

        if is_temp_id(section) {
            if let Some(record) = self
                .creates
                .get_mut(config)
                .and_then(|c| c.get_mut(section))
            {
                record.values.insert(option.to_string(), value);
            }
            return;
        }

        if matches!(
            self.deletes.get(config).and_then(|c| c.get(section)),
            Some(DeleteRecord::Section)
        ) {
            debug!(config, section, option, "ignoring set on deleted section");
            return;
        }

        self.changes
            .entry(config.to_string())
            .or_default()
            .entry(section.to_string())
            .or_default()
            .insert(option.to_string(), value);
    }

    /// Stage a deletion of one option, or of the whole section when
    /// `option` is omitted. Option deletes merge into an existing
    /// record; a whole-section delete subsumes them.
    pub fn stage_delete(&mut self, config: &str, section: &str, option: Option<&str>) {
        if is_temp_id(section) {
            // Nothing was ever sent remotely for a temp section; edit
            // the create record instead.
            match option {
                Some(option) => {
                    if let Some(record) = self
                        .creates
                        .get_mut(config)
                        .and_then(|c| c.get_mut(section))
                    {
                        record.values.remove(option);
                    }
                }
                None => self.stage_remove_section(config, section),
            }
            return;
        }

        let record = self
            .deletes
            .entry(config.to_string())
            .or_default()
            .entry(section.to_string())
            .or_insert_with(|| DeleteRecord::Options(BTreeSet::new()));

        match option {
            Some(option) => {
                if let DeleteRecord::Options(options) = record {
                    options.insert(option.to_string());
                }
            }
            None => *record = DeleteRecord::Section,
        }
    }

    /// Allocate a temporary id and stage a section creation. New
    /// sections sort after every baseline section until repositioned.
    pub fn stage_create(&mut self, config: &str, section_type: &str, name: Option<&str>) -> String {
        self.next_id += 1;
        let sid = format!("{TEMP_ID_PREFIX}{}", self.next_id);

        self.creates.entry(config.to_string()).or_default().insert(
            sid.clone(),
            CreateRecord {
                section_type: section_type.to_string(),
                name: name.map(str::to_string),
                index: 1000 + self.next_id as i64,
                values: BTreeMap::new(),
            },
        );
        sid
    }

    /// Discard a section: a temp id simply drops its create record,
    /// an existing section gets a whole-section delete and loses any
    /// pending changes.
    pub fn stage_remove_section(&mut self, config: &str, section: &str) {
        if is_temp_id(section) {
            if let Some(creates) = self.creates.get_mut(config) {
                creates.remove(section);
            }
            return;
        }

        if let Some(changes) = self.changes.get_mut(config) {
            changes.remove(section);
        }
        self.deletes
            .entry(config.to_string())
            .or_default()
            .insert(section.to_string(), DeleteRecord::Section);
    }

    /// Stage a new section ordering: dense positions in the given
    /// order, and the reorder flag for `compile`.
    pub fn stage_reorder(&mut self, config: &str, ordered: &[String]) {
        let indexes = self.indexes.entry(config.to_string()).or_default();
        for (index, sid) in ordered.iter().enumerate() {
            indexes.insert(sid.clone(), index as i64);
            if let Some(record) = self.creates.get_mut(config).and_then(|c| c.get_mut(sid)) {
                record.index = index as i64;
            }
        }
        self.reorder = true;
    }

    /// Merged section view: baseline minus whole-section deletes plus
    /// staged creates, sorted by effective position with dense
    /// reindexing. Ties keep baseline order; creates append at the end
    /// unless explicitly repositioned.
    pub fn sections(&self, snapshot: &Snapshot, config: &str) -> Vec<SectionRecord> {
        let overrides = self.indexes.get(config);
        let deleted = self.deletes.get(config);

        let mut merged: Vec<SectionRecord> = Vec::new();

        for section in snapshot.ordered_sections(config) {
            if matches!(
                deleted.and_then(|d| d.get(&section.id)),
                Some(DeleteRecord::Section)
            ) {
                continue;
            }
            let mut record = section.clone();
            if let Some(index) = overrides.and_then(|o| o.get(&record.id)) {
                record.index = *index;
            }
            merged.push(record);
        }

        if let Some(creates) = self.creates.get(config) {
            for (sid, create) in creates {
                let mut record = SectionRecord::new(sid.clone(), create.section_type.clone());
                record.create_name = create.name.clone();
                record.anonymous = create.name.is_none();
                record.index = *overrides.and_then(|o| o.get(sid)).unwrap_or(&create.index);
                record.options = create.values.clone();
                merged.push(record);
            }
        }

        merged.sort_by(|a, b| a.index.cmp(&b.index));
        for (index, record) in merged.iter_mut().enumerate() {
            record.index = index as i64;
        }
        merged
    }
}
