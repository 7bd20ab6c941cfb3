//! Crate-wide error type.
//!
//! Mirrors the donor authorization crate's `thiserror`-derived enum, with
//! variants regrouped around the error kinds required by the decision
//! engine: parse/schema, semantic, expression and scope.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthzError>;

/// A single location-tagged validation failure inside a policy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    /// JSON-ish path, e.g. `spec.rules[3].effect`.
    pub path: String,
    pub message: String,
    /// Populated when a close lexical match (Levenshtein <= 3) exists.
    pub suggestion: Option<String>,
    pub line: Option<u32>,
}

impl PathError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            suggestion: None,
            line: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// All failures collected while parsing/validating a single policy document.
/// Parsing is all-or-nothing per document: every error encountered is
/// attached here rather than surfacing only the first one.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PolicyParseError {
    pub message: String,
    pub errors: Vec<PathError>,
    pub source: Option<String>,
}

impl PolicyParseError {
    pub fn single(message: impl Into<String>, error: PathError) -> Self {
        Self {
            message: message.into(),
            errors: vec![error],
            source: None,
        }
    }

    pub fn many(message: impl Into<String>, errors: Vec<PathError>) -> Self {
        Self {
            message: message.into(),
            errors,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("policy parse error: {0}")]
    Parse(#[from] PolicyParseError),

    #[error("circular derived-role dependency: {0}")]
    CircularDependency(String),

    #[error("undefined derived role referenced: {0}")]
    UndefinedDerivedRole(String),

    #[error("duplicate derived-role definition: {0}")]
    DuplicateDefinition(String),

    #[error("unknown export referenced: {0}")]
    UnknownExport(String),

    #[error("duplicate export name: {0}")]
    DuplicateExport(String),

    #[error("invalid CEL expression: {0}")]
    InvalidCelSyntax(String),

    #[error(transparent)]
    Cel(#[from] crate::cel::error::CelError),

    #[error(transparent)]
    Scope(#[from] crate::scope::types::ScopeError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
