use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Malformed response envelope: wrong version tag or missing id.
    #[error("invalid response frame: {0}")]
    Frame(String),
    /// A response carried a correlation id no queued request matches.
    #[error("no related request for response id {0}")]
    NoRelatedRequest(u64),
    /// A keyed batch response carried an unknown key.
    #[error("no related request for response key '{0}'")]
    UnmatchedKey(String),
    /// The remote side answered with an error member instead of a result.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("a batch is already open on this transport")]
    BatchAlreadyOpen,
    #[error("no batch is open on this transport")]
    NoBatchOpen,
    /// The batch this call belonged to failed before it was resolved.
    #[error("batch failed before this call resolved")]
    BatchFailed,
    #[error("endpoint error: {0}")]
    Endpoint(String),
}
