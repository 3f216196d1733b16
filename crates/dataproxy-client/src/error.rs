//! Client error types.
//!
//! These are the failures a CRUD client can report. The proxy forwards them
//! to the GraphQL executor unchanged; the error code follows the ORM's
//! numbering so callers can match on it.

use std::fmt;

/// Errors that can occur while executing a client operation.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A record required by the operation does not exist.
    #[error("{message}")]
    NotFound {
        /// Description of the missing record.
        message: String,
    },

    /// A unique constraint rejected the write.
    #[error("Unique constraint failed on the fields: ({fields})")]
    UniqueConstraint {
        /// Comma separated list of the offending fields.
        fields: String,
    },

    /// The arguments do not form a valid query.
    #[error("{message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// The database could not be reached.
    #[error("Can't reach database server: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// The operation is not supported by this client.
    #[error("Operation not supported: {message}")]
    Unsupported {
        /// Name of the unsupported capability.
        message: String,
    },

    /// Any other failure.
    #[error("{message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl ClientError {
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unique_constraint(fields: impl Into<String>) -> Self {
        Self::UniqueConstraint {
            fields: fields.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the ORM error code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "P2025",
            Self::UniqueConstraint { .. } => "P2002",
            Self::Validation { .. } => "P2009",
            Self::Connection { .. } => "P1001",
            Self::Unsupported { .. } => "P2026",
            Self::Internal { .. } => "P5000",
        }
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::UniqueConstraint { .. } => ErrorCategory::Conflict,
            Self::Validation { .. } | Self::Unsupported { .. } => ErrorCategory::Validation,
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of client errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
