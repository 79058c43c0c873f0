//! Compilation of an overlay into an ordered batch of store calls.
//!
//! The order is load-bearing: creates go first so their assigned ids
//! exist before anything references them, then changes, then deletes,
//! and one `order` per config last so it sees final ids. Set and delete
//! calls are never addressed at a temporary id.

use std::collections::{BTreeMap, BTreeSet};

use ucf_model::{Snapshot, TEMP_ID_PREFIX, Value};
use ucf_store::DeleteSpec;

use crate::overlay::{DeleteRecord, Overlay};

/// One store call of a compiled plan. `Order` section lists may contain
/// temporary ids; the executor substitutes the real ids returned by the
/// preceding `Add` calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedCall {
    Add {
        config: String,
        temp_id: String,
        section_type: String,
        name: Option<String>,
        values: BTreeMap<String, Value>,
    },
    Set {
        config: String,
        section: String,
        values: BTreeMap<String, Value>,
    },
    Delete {
        config: String,
        section: String,
        what: DeleteSpec,
    },
    Order {
        config: String,
        sections: Vec<String>,
    },
}

impl Overlay {
    /// Compile the overlay into the minimal ordered call list realizing
    /// it. An overlay with nothing staged compiles to an empty plan.
    pub fn compile(&self, snapshot: &Snapshot) -> Vec<PlannedCall> {
        let mut plan = Vec::new();

        for (config, creates) in self.creates() {
            // Creation order, not lexical id order: ".new.10" must not
            // sort before ".new.2".
            let mut ordered: Vec<(&String, _)> = creates.iter().collect();
            ordered.sort_by_key(|(sid, _)| temp_seq(sid));

            for (sid, create) in ordered {
                plan.push(PlannedCall::Add {
                    config: config.clone(),
                    temp_id: sid.clone(),
                    section_type: create.section_type.clone(),
                    name: create.name.clone(),
                    values: create.values.clone(),
                });
            }
        }

        for (config, sections) in self.changes() {
            for (sid, values) in sections {
                if values.is_empty() {
                    continue;
                }
                plan.push(PlannedCall::Set {
                    config: config.clone(),
                    section: sid.clone(),
                    values: values.clone(),
                });
            }
        }

        for (config, sections) in self.deletes() {
            for (sid, record) in sections {
                let what = match record {
                    DeleteRecord::Section => DeleteSpec::Section,
                    DeleteRecord::Options(options) if options.is_empty() => continue,
                    DeleteRecord::Options(options) if options.len() == 1 => {
                        DeleteSpec::Option(options.iter().next().cloned().unwrap_or_default())
                    }
                    DeleteRecord::Options(options) => {
                        DeleteSpec::Options(options.iter().cloned().collect())
                    }
                };
                plan.push(PlannedCall::Delete {
                    config: config.clone(),
                    section: sid.clone(),
                    what,
                });
            }
        }

        if self.reorder_pending() {
            let mut configs: BTreeSet<&str> = snapshot.config_names().collect();
            configs.extend(self.creates().keys().map(String::as_str));

            for config in configs {
                let sections: Vec<String> = self
                    .sections(snapshot, config)
                    .into_iter()
                    .map(|s| s.id)
                    .collect();
                if !sections.is_empty() {
                    plan.push(PlannedCall::Order {
                        config: config.to_string(),
                        sections,
                    });
                }
            }
        }

        plan
    }
}

fn temp_seq(sid: &str) -> u64 {
    sid.strip_prefix(TEMP_ID_PREFIX)
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(u64::MAX)
}
