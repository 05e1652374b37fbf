//! Error types for SBDH envelope handling.

use thiserror::Error;

use crate::catalog::SbdhErrorKind;

/// Root error type for SBDH operations.
#[derive(Error, Debug)]
pub enum SbdhError {
    /// Extraction failed. `message` aggregates every error-level finding.
    #[error("{message}")]
    Read {
        /// Kind of the first error-level finding
        kind: SbdhErrorKind,
        /// Newline-joined messages of all error-level findings
        message: String,
    },

    /// A required argument was missing or empty, or a precondition was not met
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error while accessing a resource
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A validation rule is already registered for this field path
    #[error("Rule already registered: {0}")]
    DuplicateRule(String),

    /// Configuration is invalid or could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SbdhError {
    /// Create a read error whose message is the formatted catalog template.
    pub fn read<S: AsRef<str>>(kind: SbdhErrorKind, args: &[S]) -> Self {
        SbdhError::Read {
            kind,
            message: kind.format(args),
        }
    }

    /// Catalog kind of a read error.
    pub fn kind(&self) -> Option<SbdhErrorKind> {
        match self {
            SbdhError::Read { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub(crate) fn empty_argument(name: &str) -> Self {
        SbdhError::InvalidArgument(format!("{name} may not be empty"))
    }
}

impl From<serde_json::Error> for SbdhError {
    fn from(err: serde_json::Error) -> Self {
        SbdhError::Config(err.to_string())
    }
}

/// Result type alias for SBDH operations.
pub type SbdhResult<T> = Result<T, SbdhError>;
