use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("section record for '{0}' has no type tag")]
    MissingType(String),
    #[error("option '{option}' in section '{section}' is not a string or string list")]
    InvalidOption { section: String, option: String },
}
