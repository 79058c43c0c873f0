//! The form session: descriptors bound to a live edit session.
//!
//! Edited values stay in the form until `save`, which validates,
//! stages the changed values through the overlay and delegates to the
//! edit session's plan execution and reload.

use std::collections::BTreeMap;

use tracing::debug;

use ucf_model::{Address, SectionRecord, Value};
use ucf_overlay::{EditSession, Overlay};
use ucf_store::StoreClient;
use ucf_validate::{DependencyIndex, Validator, is_active};

use crate::error::{FormError, Result};
use crate::spec::{FieldSpec, Form, SectionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Unloaded,
    Loading,
    Ready,
    Saving,
    Reloading,
}

type FieldKey = (String, String);

pub struct FormSession {
    form: Form,
    session: EditSession,
    state: FormState,
    /// Compiled datatype per (section spec index, field name).
    validators: BTreeMap<(usize, String), Validator>,
    /// Reverse dependency index per section spec.
    dep_indexes: Vec<DependencyIndex>,
    /// Edited values keyed by (section id, field name); `None` marks an
    /// explicitly cleared input.
    values: BTreeMap<FieldKey, Option<Value>>,
    errors: BTreeMap<FieldKey, String>,
}

impl FormSession {
    /// Binds a form to a store client, compiling every datatype
    /// expression and registering auxiliary configs up front.
    pub fn new(store: StoreClient, form: Form) -> Result<Self> {
        let mut session = EditSession::new(store, form.config.clone());
        let mut validators = BTreeMap::new();
        let mut dep_indexes = Vec::with_capacity(form.sections.len());

        for (idx, spec) in form.sections.iter().enumerate() {
            let mut index = DependencyIndex::new();
            for field in spec.all_fields() {
                if let Some(expr) = &field.datatype {
                    validators.insert((idx, field.name.clone()), Validator::compile(expr)?);
                }
                index.record(&field.name, &field.depends);
                if let Some(config) = &field.config {
                    session.require_config(config);
                }
            }
            dep_indexes.push(index);
        }

        Ok(Self {
            form,
            session,
            state: FormState::Unloaded,
            validators,
            dep_indexes,
            values: BTreeMap::new(),
            errors: BTreeMap::new(),
        })
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn field_error(&self, sid: &str, field: &str) -> Option<&str> {
        self.errors
            .get(&(sid.to_string(), field.to_string()))
            .map(String::as_str)
    }

    /// Errors rolled up for one concrete section.
    pub fn section_error_count(&self, sid: &str) -> usize {
        self.errors.keys().filter(|(s, _)| s == sid).count()
    }

    /// Concrete store sections matched by one descriptor, in display
    /// order under the current overlay.
    pub fn instances(&self, spec: &SectionSpec) -> Vec<SectionRecord> {
        self.session
            .sections(&self.form.config)
            .into_iter()
            .filter(|record| spec.matches(record))
            .collect()
    }

    /// Fetch every required config and reset the edit state.
    pub async fn load(&mut self) -> Result<()> {
        self.state = FormState::Loading;
        if let Err(err) = self.session.load().await {
            self.state = FormState::Unloaded;
            return Err(err.into());
        }
        self.values.clear();
        self.errors.clear();
        self.state = FormState::Ready;
        Ok(())
    }

    /// Drop all edits without touching the store.
    pub fn discard(&mut self) {
        self.values.clear();
        self.errors.clear();
        *self.session.overlay_mut() = Overlay::new();
        self.state = FormState::Unloaded;
    }

    /// The value a widget shows: the edited value when present, else
    /// the effective stored value, else the field's initial value.
    pub fn value(&self, sid: &str, field: &str) -> Result<Option<Value>> {
        let (_, spec) = self.spec_for(sid)?;
        let field = Self::field_of(spec, field)?;
        Ok(self.current_value(sid, field))
    }

    /// Record an edit and re-validate the field plus everything that
    /// depends on it.
    pub fn set_value(&mut self, sid: &str, field: &str, value: Option<Value>) -> Result<()> {
        if self.state != FormState::Ready {
            return Err(FormError::NotLoaded);
        }
        let (idx, spec) = self.spec_for(sid)?;
        Self::field_of(spec, field)?;

        self.values
            .insert((sid.to_string(), field.to_string()), value);

        let mut names = vec![field.to_string()];
        names.extend(
            self.dep_indexes[idx]
                .dependents_of(field)
                .map(str::to_string),
        );
        for name in names {
            self.validate_field(idx, sid, &name)?;
        }
        Ok(())
    }

    /// Whether a field is shown, given its dependency rules and the
    /// current values of the fields they reference.
    pub fn field_active(&self, sid: &str, field: &str) -> Result<bool> {
        let (_, spec) = self.spec_for(sid)?;
        let field = Self::field_of(spec, field)?;
        Ok(self.active(spec, sid, field))
    }

    /// Validate every field of every matched section. Inactive fields
    /// are skipped; empty non-optional fields fail with a fixed
    /// message. Returns the aggregate error count.
    pub fn validate(&mut self) -> usize {
        let work: Vec<(usize, String, String)> = self
            .form
            .sections
            .iter()
            .enumerate()
            .flat_map(|(idx, spec)| {
                self.instances(spec)
                    .into_iter()
                    .flat_map(move |record| {
                        spec.all_fields()
                            .map(|field| (idx, record.id.clone(), field.name.clone()))
                            .collect::<Vec<_>>()
                    })
            })
            .collect();

        for (idx, sid, field) in work {
            // Field lookup cannot fail here, the names came from the spec.
            let _ = self.validate_field(idx, &sid, &field);
        }
        self.errors.len()
    }

    /// Add a section through the form; requires the descriptor to
    /// allow it. Returns the temporary id.
    pub fn add_section(&mut self, section_type: &str, name: Option<&str>) -> Result<String> {
        let spec = self
            .form
            .find_section(section_type)
            .ok_or_else(|| FormError::UnknownSection(section_type.to_string()))?;
        if !spec.addremove {
            return Err(FormError::AddRemoveDisabled(section_type.to_string()));
        }
        let name = if spec.anonymous { None } else { name };
        let config = self.form.config.clone();
        Ok(self
            .session
            .overlay_mut()
            .stage_create(&config, section_type, name))
    }

    pub fn remove_section(&mut self, sid: &str) -> Result<()> {
        let (_, spec) = self.spec_for(sid)?;
        if !spec.addremove {
            return Err(FormError::AddRemoveDisabled(spec.section_type.clone()));
        }
        let config = self.form.config.clone();
        self.session.overlay_mut().stage_remove_section(&config, sid);
        self.values.retain(|(s, _), _| s != sid);
        self.errors.retain(|(s, _), _| s != sid);
        Ok(())
    }

    pub fn reorder_sections(&mut self, section_type: &str, ordered: &[String]) -> Result<()> {
        let spec = self
            .form
            .find_section(section_type)
            .ok_or_else(|| FormError::UnknownSection(section_type.to_string()))?;
        if !spec.sortable {
            return Err(FormError::NotSortable(section_type.to_string()));
        }
        let config = self.form.config.clone();
        self.session.overlay_mut().stage_reorder(&config, ordered);
        Ok(())
    }

    /// Validate, stage every changed value, execute and reload.
    /// Validation failure keeps the session `Ready` with the per-field
    /// errors recorded; an execution failure keeps the overlay intact.
    pub async fn save(&mut self) -> Result<BTreeMap<String, String>> {
        if self.form.readonly {
            return Err(FormError::ReadOnly);
        }
        if self.state != FormState::Ready {
            return Err(FormError::NotLoaded);
        }

        let errors = self.validate();
        if errors > 0 {
            return Err(FormError::Validation { errors });
        }

        self.state = FormState::Saving;
        self.stage_edits();
        let assigned = match self.session.apply().await {
            Ok(assigned) => assigned,
            Err(err) => {
                self.state = FormState::Ready;
                return Err(err.into());
            }
        };

        self.state = FormState::Reloading;
        if let Err(err) = self.session.load().await {
            self.state = FormState::Unloaded;
            return Err(err.into());
        }

        self.values.clear();
        self.errors.clear();
        self.state = FormState::Ready;
        debug!(config = %self.form.config, "form saved");
        Ok(assigned)
    }

    /// Make the staged store writes durable.
    pub async fn commit(&self) -> Result<()> {
        Ok(self.session.commit().await?)
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    fn stage_edits(&mut self) {
        let work: Vec<(usize, String)> = self
            .form
            .sections
            .iter()
            .enumerate()
            .flat_map(|(idx, spec)| {
                self.instances(spec)
                    .into_iter()
                    .map(move |record| (idx, record.id))
            })
            .collect();

        for (idx, sid) in work {
            let spec = &self.form.sections[idx];
            let fields: Vec<FieldSpec> = spec.all_fields().cloned().collect();
            for field in fields {
                let spec = &self.form.sections[idx];
                let addr = self.address(&field, &sid);
                let option = addr.option.as_deref().unwrap_or(&field.name);

                if !self.active(spec, &sid, &field) {
                    if !field.keep {
                        debug!(%addr, "dropping inactive unkept field");
                        self.session
                            .overlay_mut()
                            .stage_set(&addr.config, &addr.section, option, None);
                    }
                    continue;
                }

                let key = (sid.clone(), field.name.clone());
                if let Some(edited) = self.values.get(&key) {
                    let stored = self.stored_value(&sid, &field);
                    if *edited != stored {
                        let value = edited.clone();
                        self.session
                            .overlay_mut()
                            .stage_set(&addr.config, &addr.section, option, value);
                    }
                }
            }
        }
    }

    fn validate_field(&mut self, idx: usize, sid: &str, name: &str) -> Result<()> {
        let spec = &self.form.sections[idx];
        let field = Self::field_of(spec, name)?;
        let key = (sid.to_string(), name.to_string());

        let message = if self.active(spec, sid, field) {
            self.check_value(idx, sid, field)
        } else {
            None
        };

        match message {
            Some(message) => {
                self.errors.insert(key, message);
            }
            None => {
                self.errors.remove(&key);
            }
        }
        Ok(())
    }

    fn check_value(&self, idx: usize, sid: &str, field: &FieldSpec) -> Option<String> {
        let value = self
            .current_value(sid, field)
            .map(|v| v.as_scalar())
            .unwrap_or_default();

        if value.is_empty() {
            if field.optional {
                return None;
            }
            return Some("Field must not be empty".to_string());
        }

        if let Some(check) = field.predicate {
            return check(&value).err();
        }
        if let Some(validator) = self.validators.get(&(idx, field.name.clone())) {
            return validator.validate(&value).err();
        }
        None
    }

    fn active(&self, spec: &SectionSpec, sid: &str, field: &FieldSpec) -> bool {
        is_active(&field.depends, |name| {
            spec.find_field(name)
                .and_then(|controller| self.current_value(sid, controller))
                .map(|v| v.as_scalar())
        })
    }

    fn current_value(&self, sid: &str, field: &FieldSpec) -> Option<Value> {
        let key = (sid.to_string(), field.name.clone());
        match self.values.get(&key) {
            Some(edited) => edited.clone(),
            None => self.stored_value(sid, field),
        }
    }

    fn stored_value(&self, sid: &str, field: &FieldSpec) -> Option<Value> {
        let addr = self.address(field, sid);
        let option = addr.option.as_deref().unwrap_or(&field.name);
        self.session
            .resolve(&addr.config, &addr.section, option)
            .cloned()
            .or_else(|| field.initial.clone())
    }

    /// Storage address of a field instance: option defaults to the
    /// field name, section to the current section id, config to the
    /// form's primary config.
    fn address(&self, field: &FieldSpec, sid: &str) -> Address {
        Address::option(
            field
                .config
                .clone()
                .unwrap_or_else(|| self.form.config.clone()),
            field.section.clone().unwrap_or_else(|| sid.to_string()),
            field.option.clone().unwrap_or_else(|| field.name.clone()),
        )
    }

    fn spec_for(&self, sid: &str) -> Result<(usize, &SectionSpec)> {
        let record = self
            .session
            .sections(&self.form.config)
            .into_iter()
            .find(|record| record.id == sid)
            .ok_or_else(|| FormError::UnknownSection(sid.to_string()))?;

        self.form
            .sections
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.matches(&record))
            .ok_or_else(|| FormError::UnknownSection(sid.to_string()))
    }

    fn field_of<'a>(spec: &'a SectionSpec, name: &str) -> Result<&'a FieldSpec> {
        spec.find_field(name).ok_or_else(|| FormError::UnknownField {
            section_type: spec.section_type.clone(),
            field: name.to_string(),
        })
    }
}
