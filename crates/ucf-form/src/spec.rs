//! Form descriptors: fields, tabs, sections and the form itself.
//!
//! Descriptors are declarative; all behavior lives in the session. A
//! field defaults to storing under its own name in the current section
//! of the form's primary config, each part overridable per field.

use ucf_model::{SectionRecord, Value};
use ucf_validate::DepRule;

/// One editable option.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub caption: Option<String>,
    pub description: Option<String>,
    /// Datatype expression compiled at session construction.
    pub datatype: Option<String>,
    /// Custom predicate checked instead of a datatype expression.
    pub predicate: Option<fn(&str) -> std::result::Result<(), String>>,
    /// Empty values pass validation when set.
    pub optional: bool,
    /// When `false`, deactivating the field deletes its stored option
    /// on save instead of keeping the stale value.
    pub keep: bool,
    pub placeholder: Option<String>,
    /// Value assumed when the store has none.
    pub initial: Option<Value>,
    pub config: Option<String>,
    pub section: Option<String>,
    pub option: Option<String>,
    pub depends: Vec<DepRule>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            caption: None,
            description: None,
            datatype: None,
            predicate: None,
            optional: false,
            keep: true,
            placeholder: None,
            initial: None,
            config: None,
            section: None,
            option: None,
            depends: Vec::new(),
        }
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn datatype(mut self, expr: impl Into<String>) -> Self {
        self.datatype = Some(expr.into());
        self
    }

    pub fn predicate(mut self, check: fn(&str) -> std::result::Result<(), String>) -> Self {
        self.predicate = Some(check);
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    /// Store under a different config than the form's primary one.
    pub fn config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Store under a fixed section id instead of the current one.
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Store under a different option name than the field name.
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }

    pub fn depends(mut self, rule: DepRule) -> Self {
        if !rule.is_empty() {
            self.depends.push(rule);
        }
        self
    }
}

/// Named group of fields rendered together.
#[derive(Debug, Clone)]
pub struct TabSpec {
    pub id: String,
    pub caption: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl TabSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            caption: None,
            fields: Vec::new(),
        }
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }
}

/// All store sections of one type, edited through a shared field set.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub section_type: String,
    pub caption: Option<String>,
    pub fields: Vec<FieldSpec>,
    pub tabs: Vec<TabSpec>,
    /// Narrows the matched sections beyond the type tag.
    pub filter: Option<fn(&SectionRecord) -> bool>,
    pub addremove: bool,
    pub sortable: bool,
    /// Name sections anonymously when added through the form.
    pub anonymous: bool,
}

impl SectionSpec {
    pub fn new(section_type: impl Into<String>) -> Self {
        Self {
            section_type: section_type.into(),
            caption: None,
            fields: Vec::new(),
            tabs: Vec::new(),
            filter: None,
            addremove: false,
            sortable: false,
            anonymous: true,
        }
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn tab(mut self, tab: TabSpec) -> Self {
        self.tabs.push(tab);
        self
    }

    pub fn filter(mut self, filter: fn(&SectionRecord) -> bool) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn addremove(mut self, addremove: bool) -> Self {
        self.addremove = addremove;
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    /// Direct fields followed by tabbed fields, declaration order.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .iter()
            .chain(self.tabs.iter().flat_map(|tab| tab.fields.iter()))
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldSpec> {
        self.all_fields().find(|field| field.name == name)
    }

    /// Whether a concrete store section belongs to this descriptor.
    pub fn matches(&self, record: &SectionRecord) -> bool {
        record.section_type == self.section_type && self.filter.is_none_or(|f| f(record))
    }
}

/// A whole form over one primary config.
#[derive(Debug, Clone)]
pub struct Form {
    pub config: String,
    pub caption: Option<String>,
    pub sections: Vec<SectionSpec>,
    pub readonly: bool,
}

impl Form {
    pub fn new(config: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            caption: None,
            sections: Vec::new(),
            readonly: false,
        }
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn section(mut self, section: SectionSpec) -> Self {
        self.sections.push(section);
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn find_section(&self, section_type: &str) -> Option<&SectionSpec> {
        self.sections
            .iter()
            .find(|spec| spec.section_type == section_type)
    }
}
