//! One editing session: snapshot + overlay + store client.
//!
//! `load` replaces the snapshot wholesale and resets the overlay;
//! `save` executes the compiled plan and, only on full success, reloads.
//! A failed call leaves snapshot and overlay exactly as they were; no
//! rollback of already-applied calls is attempted.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use ucf_model::{SectionRecord, Snapshot, Value};
use ucf_store::{Pending, StoreClient};

use crate::error::{OverlayError, Result};
use crate::overlay::Overlay;
use crate::plan::PlannedCall;

pub struct EditSession {
    store: StoreClient,
    primary: String,
    aux: BTreeSet<String>,
    snapshot: Snapshot,
    overlay: Overlay,
}

impl EditSession {
    pub fn new(store: StoreClient, primary: impl Into<String>) -> Self {
        Self {
            store,
            primary: primary.into(),
            aux: BTreeSet::new(),
            snapshot: Snapshot::new(),
            overlay: Overlay::new(),
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn store(&self) -> &StoreClient {
        &self.store
    }

    /// Register an auxiliary config namespace to be loaded alongside
    /// the primary one.
    pub fn require_config(&mut self, config: &str) {
        if config != self.primary {
            self.aux.insert(config.to_string());
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }

    pub fn resolve(&self, config: &str, section: &str, option: &str) -> Option<&Value> {
        self.overlay.resolve(&self.snapshot, config, section, option)
    }

    /// Merged section view for one config under the current overlay.
    pub fn sections(&self, config: &str) -> Vec<SectionRecord> {
        self.overlay.sections(&self.snapshot, config)
    }

    /// Fetch all required configs in one batch and start a fresh
    /// overlay. A config the store has no data for loads as empty.
    pub async fn load(&mut self) -> Result<()> {
        let configs: Vec<String> = std::iter::once(self.primary.clone())
            .chain(self.aux.iter().cloned())
            .collect();

        let batch = self.store.batch()?;
        let mut pending = Vec::with_capacity(configs.len());
        for config in &configs {
            pending.push(batch.get_all(config)?);
        }
        batch.flush().await?;

        let mut snapshot = Snapshot::new();
        for (config, call) in configs.into_iter().zip(pending) {
            let sections = call.wait().await?.unwrap_or_default();
            snapshot.insert_config(config, sections);
        }

        debug!(primary = %self.primary, "session loaded");
        self.snapshot = snapshot;
        self.overlay = Overlay::new();
        Ok(())
    }

    /// Compile the overlay and execute it against the store, without
    /// reloading. The overlay stays intact, so callers see the staged
    /// state until they reload (or can retry after a failure).
    /// Returns the temp-id to real-id substitutions that were applied.
    pub async fn apply(&self) -> Result<BTreeMap<String, String>> {
        let plan = self.overlay.compile(&self.snapshot);
        if plan.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.execute(&plan).await
    }

    /// Execute the staged plan and reload a fresh snapshot.
    pub async fn save(&mut self) -> Result<BTreeMap<String, String>> {
        let assigned = self.apply().await?;
        self.load().await?;
        Ok(assigned)
    }

    /// Make the server-side staged writes durable.
    pub async fn commit(&self) -> Result<()> {
        let mut configs: BTreeSet<&str> = self.aux.iter().map(String::as_str).collect();
        configs.insert(&self.primary);
        for config in configs {
            self.store.commit(Some(config)).await?;
        }
        Ok(())
    }

    async fn execute(&self, plan: &[PlannedCall]) -> Result<BTreeMap<String, String>> {
        // First batch: creates, changes, deletes. Ordering calls wait
        // for the assigned ids.
        let batch = self.store.batch()?;
        let mut adds: Vec<(String, Pending<String>)> = Vec::new();
        let mut units: Vec<Pending<()>> = Vec::new();

        for call in plan {
            match call {
                PlannedCall::Add {
                    config,
                    temp_id,
                    section_type,
                    name,
                    values,
                } => {
                    let values = (!values.is_empty()).then_some(values);
                    let pending =
                        batch.add(config, section_type, name.as_deref(), values)?;
                    adds.push((temp_id.clone(), pending));
                }
                PlannedCall::Set {
                    config,
                    section,
                    values,
                } => units.push(batch.set_values(config, section, values)?),
                PlannedCall::Delete {
                    config,
                    section,
                    what,
                } => units.push(batch.delete(config, section, what)?),
                PlannedCall::Order { .. } => {}
            }
        }
        batch.flush().await?;

        let mut assigned = BTreeMap::new();
        for (temp_id, pending) in adds {
            let real = pending.wait().await?;
            assigned.insert(temp_id, real);
        }
        for unit in units {
            unit.wait().await?;
        }

        // Second batch: orderings, with temp ids substituted.
        let orders: Vec<(&String, &Vec<String>)> = plan
            .iter()
            .filter_map(|call| match call {
                PlannedCall::Order { config, sections } => Some((config, sections)),
                _ => None,
            })
            .collect();

        if !orders.is_empty() {
            let batch = self.store.batch()?;
            let mut units = Vec::with_capacity(orders.len());
            for (config, sections) in orders {
                let mut resolved = Vec::with_capacity(sections.len());
                for sid in sections {
                    if ucf_model::is_temp_id(sid) {
                        let real = assigned
                            .get(sid)
                            .ok_or_else(|| OverlayError::MissingAddResult(sid.clone()))?;
                        resolved.push(real.clone());
                    } else {
                        resolved.push(sid.clone());
                    }
                }
                units.push(batch.order(config, &resolved)?);
            }
            batch.flush().await?;
            for unit in units {
                unit.wait().await?;
            }
        }

        Ok(assigned)
    }
}
