use thiserror::Error;

use ucf_store::StoreError;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The remote store confirmed fewer creates than the plan issued.
    #[error("missing add result for staged section '{0}'")]
    MissingAddResult(String),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
