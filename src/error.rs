use std::path::PathBuf;
use thiserror::Error;

/// Every failure the engine can report.
///
/// Per-record problems (`SchemaViolation`, `Validation`, `NotFound` during a
/// delete) are reported per record by the indexer; storage problems abort
/// the transaction they happened in.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("schema violation in field '{field}': {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("invalid value for field '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("path already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("corrupt database: {0}")]
    Corrupt(String),

    #[error("unsupported database format version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("query has no terms and no filters")]
    EmptyQuery,

    #[error("invalid result range: {0}")]
    InvalidRange(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("a search request is already in progress")]
    RequestInProgress,

    #[error("engine error: {0}")]
    Engine(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SearchError::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SearchError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Failures of the storage layer itself. These abort the running
    /// transaction instead of being attributed to a single record.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            SearchError::Io(_)
                | SearchError::Corrupt(_)
                | SearchError::Conflict(_)
                | SearchError::VersionMismatch { .. }
        )
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            SearchError::Io(err.into())
        } else {
            SearchError::Corrupt(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SearchError::schema("title", "unknown option 'colour'");
        assert_eq!(
            err.to_string(),
            "schema violation in field 'title': unknown option 'colour'"
        );
        assert_eq!(SearchError::EmptyQuery.to_string(), "query has no terms and no filters");
    }

    #[test]
    fn test_storage_failures() {
        assert!(SearchError::Corrupt("bad crc".into()).is_storage_failure());
        assert!(SearchError::Io(std::io::Error::other("disk")).is_storage_failure());
        assert!(!SearchError::validation("id", "empty").is_storage_failure());
        assert!(!SearchError::NotFound("doc".into()).is_storage_failure());
    }

    #[test]
    fn test_json_syntax_error_is_corrupt() {
        let err: SearchError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, SearchError::Corrupt(_)));
    }
}
