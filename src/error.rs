//! Error taxonomy for the recurrence engine and its command surface.

use crate::period::ParseError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidPeriod,
    InvalidDate,
    InvalidConfig,
    InvalidArgument,
    MissingDue,

    // Lookup errors
    TaskNotFound,
    AmbiguousId,
    NoMatch,

    // Integrity violations
    DuplicateId,
    DuplicateMask,

    // Internal errors
    DatabaseError,
}

/// Every failure the engine can report.
#[derive(Debug, Error)]
pub enum RecurError {
    /// Unsupported or ambiguous period token; shown verbatim.
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("'{0}' is not a valid date")]
    InvalidDate(String),

    #[error("a recurring task must also have a due date")]
    MissingDue,

    #[error("invalid value for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("id prefix '{0}' matches more than one task")]
    AmbiguousId(String),

    /// Nothing matched. Not a defect, but reported as a failure so callers
    /// can tell "nothing to show" from "showed something".
    #[error("No matches.")]
    NoMatch,

    /// Internal invariant violation. Never recovered from.
    #[error("integrity violation: duplicate task id {0}")]
    DuplicateId(Uuid),

    #[error("integrity violation: mask index {mask_index} used twice under parent {parent}")]
    DuplicateMask { parent: Uuid, mask_index: u32 },

    #[error(transparent)]
    Store(anyhow::Error),
}

/// Store errors may carry an engine error raised inside a closure or loader;
/// that error keeps its own code instead of becoming a store failure.
impl From<anyhow::Error> for RecurError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<RecurError>() {
            Ok(inner) => inner,
            Err(err) => RecurError::Store(err),
        }
    }
}

impl RecurError {
    pub fn invalid_config(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            RecurError::Parse(_) => ErrorCode::InvalidPeriod,
            RecurError::InvalidDate(_) => ErrorCode::InvalidDate,
            RecurError::MissingDue => ErrorCode::MissingDue,
            RecurError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            RecurError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            RecurError::TaskNotFound(_) => ErrorCode::TaskNotFound,
            RecurError::AmbiguousId(_) => ErrorCode::AmbiguousId,
            RecurError::NoMatch => ErrorCode::NoMatch,
            RecurError::DuplicateId(_) => ErrorCode::DuplicateId,
            RecurError::DuplicateMask { .. } => ErrorCode::DuplicateMask,
            RecurError::Store(_) => ErrorCode::DatabaseError,
        }
    }

    /// True for invariant violations that indicate an engine defect.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            RecurError::DuplicateId(_) | RecurError::DuplicateMask { .. }
        )
    }

    /// Process exit status for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self.code() {
            ErrorCode::NoMatch => 1,
            ErrorCode::InvalidPeriod
            | ErrorCode::InvalidDate
            | ErrorCode::InvalidConfig
            | ErrorCode::InvalidArgument
            | ErrorCode::MissingDue
            | ErrorCode::TaskNotFound
            | ErrorCode::AmbiguousId => 2,
            ErrorCode::DuplicateId | ErrorCode::DuplicateMask => 3,
            ErrorCode::DatabaseError => 4,
        }
    }
}

/// Result type for engine operations.
pub type RecurResult<T> = std::result::Result<T, RecurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_is_verbatim() {
        let err: RecurError = ParseError::Unsupported("2".into()).into();
        assert_eq!(err.to_string(), "the duration value '2' is not supported");
        assert_eq!(err.code(), ErrorCode::InvalidPeriod);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_no_match_is_failure_exit() {
        assert_eq!(RecurError::NoMatch.exit_code(), 1);
        assert_eq!(RecurError::NoMatch.to_string(), "No matches.");
    }

    #[test]
    fn test_integrity_errors_are_flagged() {
        let err = RecurError::DuplicateId(Uuid::nil());
        assert!(err.is_integrity());
        assert_eq!(err.exit_code(), 3);
        assert!(!RecurError::NoMatch.is_integrity());
    }

    #[test]
    fn test_error_code_serializes_screaming() {
        let json = serde_json::to_string(&ErrorCode::DuplicateMask).unwrap();
        assert_eq!(json, "\"DUPLICATE_MASK\"");
    }

    #[test]
    fn test_wrapped_engine_error_keeps_its_code() {
        let wrapped = anyhow::Error::from(RecurError::invalid_config(
            "recurrence.limit",
            "must be at least 1",
        ))
        .context("failed to load config file");
        let err = RecurError::from(wrapped);
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert_eq!(err.exit_code(), 2);

        let err = RecurError::from(anyhow::anyhow!("disk full"));
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert_eq!(err.exit_code(), 4);
    }
}
