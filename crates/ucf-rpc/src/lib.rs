pub mod client;
pub mod envelope;
pub mod error;
pub mod transport;

pub use client::{PendingCall, RpcClient};
pub use envelope::{CallSpec, Outcome, ResponseFrame, STATUS_OK};
pub use error::RpcError;
pub use transport::Endpoint;
