use thiserror::Error;

/// Errors raised while obtaining or validating an introspection document.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Failed to parse introspection document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid introspection document: {0}")]
    InvalidDocument(String),

    #[error("Introspection provider failed: {0}")]
    Provider(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Create a new InvalidDocument error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }

    /// Create a new Provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_document("model `Post` is not declared");
        assert_eq!(
            err.to_string(),
            "Invalid introspection document: model `Post` is not declared"
        );

        let err = CoreError::provider("exit status 1");
        assert_eq!(err.to_string(), "Introspection provider failed: exit status 1");
    }

    #[test]
    fn test_from_serde_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = parse_err.into();
        assert!(matches!(err, CoreError::Parse(_)));
    }
}
