//! Core error types.

use std::fmt;

use thiserror::Error;

/// Errors raised while building or executing a nested query.
#[derive(Debug, Error)]
pub enum Error {
    /// Template declares a variable or binding it does not contain.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// Chain definition is inconsistent.
    #[error("invalid chain at level {level}: {reason}")]
    InvalidChain { level: usize, reason: String },

    /// Wrong number of arguments for a template.
    #[error("arity mismatch: expected {expected} arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Pivot or property binding missing from a result row.
    #[error("binding '{binding}' not found in rows of level {level}")]
    BindingNotFound { binding: String, level: usize },

    /// Input variable of a level cannot be resolved from the parent row.
    #[error("variable '{variable}' of level {level} is not bound by the parent row")]
    UnboundVariable { variable: String, level: usize },

    /// Query executor failure.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// A pivot value reappeared after its group was closed.
    #[error("pivot value '{value}' reappeared at level {level}; rows must be ordered by the pivot")]
    UnorderedPivot { level: usize, value: String },

    /// Execution was cancelled by the caller.
    #[error("execution cancelled")]
    Cancelled,

    /// Structurally invalid document writer call.
    #[error("document error: {0}")]
    Document(String),

    /// Malformed `<field-binding>:<value-binding>` pattern.
    #[error("invalid field mapping '{0}', expected <field-binding>:<value-binding>")]
    InvalidFieldMapping(String),

    /// Output I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Chain or fixture description could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Classification of executor failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    /// The data source refused this particular query text.
    Rejected,
    /// I/O failure while producing rows.
    Io,
    /// The data source cannot be reached.
    Unavailable,
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionErrorKind::Rejected => write!(f, "query rejected"),
            ExecutionErrorKind::Io => write!(f, "io failure"),
            ExecutionErrorKind::Unavailable => write!(f, "data source unavailable"),
        }
    }
}

/// Failure reported by a [`QueryExecutor`](crate::executor::QueryExecutor).
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ExecutionError {
    /// Failure class.
    pub kind: ExecutionErrorKind,
    /// Human readable cause.
    pub message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExecutionError {
    /// Create a new execution error.
    pub fn new(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// The data source rejected the query text.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Rejected, message)
    }

    /// The data source is not reachable.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Unavailable, message)
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the failure is specific to the query text rather than the environment.
    pub fn is_rejection(&self) -> bool {
        self.kind == ExecutionErrorKind::Rejected
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        Self::new(ExecutionErrorKind::Io, message).with_source(err)
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
