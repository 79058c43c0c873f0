//! Declarative forms over the staged configuration edit engine.

pub mod error;
pub mod session;
pub mod spec;

pub use error::FormError;
pub use session::{FormSession, FormState};
pub use spec::{FieldSpec, Form, SectionSpec, TabSpec};
