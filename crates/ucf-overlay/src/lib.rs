pub mod error;
pub mod overlay;
pub mod plan;
pub mod session;

pub use error::OverlayError;
pub use overlay::{CreateRecord, DeleteRecord, Overlay};
pub use plan::PlannedCall;
pub use session::EditSession;
