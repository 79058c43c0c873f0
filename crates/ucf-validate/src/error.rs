use thiserror::Error;

/// Failures while turning a datatype expression into a validator program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("unhandled token '{0}'")]
    UnhandledToken(String),

    #[error("argument list follows a non-validator")]
    ArgumentListAfterLiteral,

    #[error("unbalanced parentheses")]
    UnbalancedParens,
}
