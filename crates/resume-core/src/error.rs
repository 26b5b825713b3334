use thiserror::Error;

/// Top-level error type for the resume index.
///
/// Variants follow the failure taxonomy of the store: a wrong embedding width
/// is a caller error, disagreement between the persisted representations is
/// `CorruptState`, and transient disk failures surface as `Io`. A duplicate
/// filename is not an error at all; see `InsertOutcome` in `resume-vector`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResumeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: store holds {expected}-dimensional embeddings, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt index state: {0}")]
    CorruptState(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ResumeError {
    fn from(err: toml::de::Error) -> Self {
        ResumeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ResumeError {
    fn from(err: toml::ser::Error) -> Self {
        ResumeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ResumeError {
    fn from(err: serde_json::Error) -> Self {
        ResumeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for resume index operations.
pub type Result<T> = std::result::Result<T, ResumeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResumeError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let err = ResumeError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: store holds 384-dimensional embeddings, got 3"
        );
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(ResumeError, &str)> = vec![
            (
                ResumeError::InvalidInput("empty filename".to_string()),
                "Invalid input: empty filename",
            ),
            (
                ResumeError::CorruptState("length mismatch".to_string()),
                "Corrupt index state: length mismatch",
            ),
            (
                ResumeError::Storage("lock poisoned".to_string()),
                "Storage error: lock poisoned",
            ),
            (
                ResumeError::Embedding("model missing".to_string()),
                "Embedding error: model missing",
            ),
            (
                ResumeError::Extraction("not utf-8".to_string()),
                "Extraction error: not utf-8",
            ),
            (
                ResumeError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ResumeError = io_err.into();
        assert!(matches!(err, ResumeError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: ResumeError = err.unwrap_err().into();
        assert!(matches!(err, ResumeError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: ResumeError = err.unwrap_err().into();
        assert!(matches!(err, ResumeError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
