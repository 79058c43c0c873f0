//! Datatype expression compiler and dependency rule evaluation.

pub mod depends;
pub mod error;
pub mod expr;
pub mod types;

pub use depends::{DepCondition, DepRule, DependencyIndex, is_active};
pub use error::CompileError;
pub use expr::{Arg, Call, Validator};
pub use types::Kind;
