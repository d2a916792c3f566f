use crate::duration::format_duration;
use crate::models::ChatId;

/// A timeout outside the chat's `0 < timeout <= timeout_limit` bounds
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("timeout must be greater than 0")]
    TooLow,

    #[error("maximum timeout value: {}", format_duration(*limit))]
    ExceedsLimit { limit: u64 },
}

/// A timeout argument that does not follow the `1h15m` grammar
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("timeout value is missing")]
    Empty,

    #[error("timeout cannot be negative")]
    Negative,

    #[error("timeout needs a unit suffix (s, m or h)")]
    MissingUnit,

    #[error("cannot parse timeout '{0}'")]
    Malformed(String),

    #[error("timeout must be greater than 0")]
    Zero,

    #[error("timeout is too large")]
    Overflow,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown chat configuration: {0}")]
    NotFound(ChatId),

    #[error("chat {0} is already configured")]
    AlreadyExists(ChatId),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}
