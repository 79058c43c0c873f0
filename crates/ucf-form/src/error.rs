use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid datatype expression: {0}")]
    Compile(#[from] ucf_validate::CompileError),

    #[error(transparent)]
    Overlay(#[from] ucf_overlay::OverlayError),

    #[error("{errors} field(s) failed validation")]
    Validation { errors: usize },

    #[error("form is read-only")]
    ReadOnly,

    #[error("form has not been loaded")]
    NotLoaded,

    #[error("no field '{field}' in section type '{section_type}'")]
    UnknownField { section_type: String, field: String },

    #[error("no form section matches '{0}'")]
    UnknownSection(String),

    #[error("section type '{0}' does not allow adding or removing")]
    AddRemoveDisabled(String),

    #[error("section type '{0}' is not sortable")]
    NotSortable(String),
}

pub type Result<T> = std::result::Result<T, FormError>;
