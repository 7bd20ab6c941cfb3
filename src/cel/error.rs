//! CEL error types and classification (spec.md §4.2).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CelError>;

/// The three error classes `evaluate` must distinguish between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Parse,
    Evaluation,
    Unknown,
}

#[derive(Debug, Error)]
pub enum CelError {
    #[error("CEL parse error: {0}")]
    Parse(String),

    #[error("CEL evaluation error: {0}")]
    Evaluation(String),

    #[error("expression exceeded complexity limits: {0}")]
    ComplexityExceeded(String),

    #[error("unknown function called: {0}")]
    UnknownFunction(String),

    #[error("expression did not evaluate to a boolean")]
    NonBooleanResult,
}

impl CelError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            CelError::Parse(_) => ErrorType::Parse,
            CelError::Evaluation(_)
            | CelError::ComplexityExceeded(_)
            | CelError::UnknownFunction(_)
            | CelError::NonBooleanResult => ErrorType::Evaluation,
        }
    }
}
