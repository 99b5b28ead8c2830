use thiserror::Error;

/// Errors raised by the core transform and its input validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid timestamp '{0}': expected RFC 3339 or ISO 8601")]
    InvalidTimestamp(String),

    #[error("role '{0}' is not allowed in normalized chat input")]
    RoleNotAllowed(String),

    #[error("grouping.consecutive_user_limit must be > 0")]
    ZeroUserLimit,

    #[error("grouping.time_threshold must not be negative")]
    NegativeThreshold,

    #[error("unknown training format '{0}': expected chat or instruct")]
    UnknownFormat(String),
}
