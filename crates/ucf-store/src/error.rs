use thiserror::Error;

use ucf_model::ModelError;
use ucf_rpc::RpcError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Model(#[from] ModelError),
    /// A mutating operation came back with a non-zero status.
    #[error("store operation failed with status {0}")]
    Status(i64),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
