use std::fmt;

/// Machine-readable error codes shared by the core and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidDayKey,
    ItemNotFound,
    GoalAlreadyCompleted,
    ClearInProgress,
    CacheWriteFailed,
    CacheEncodeFailed,
    LockContention,
    RemoteUnavailable,
    RemoteUnauthorized,
    RemoteRejected,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::InvalidDayKey => "E1003",
            Self::ItemNotFound => "E2001",
            Self::GoalAlreadyCompleted => "E2002",
            Self::ClearInProgress => "E2003",
            Self::CacheWriteFailed => "E5001",
            Self::CacheEncodeFailed => "E5003",
            Self::LockContention => "E5002",
            Self::RemoteUnavailable => "E7001",
            Self::RemoteUnauthorized => "E7002",
            Self::RemoteRejected => "E7003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidDayKey => "Invalid day key",
            Self::ItemNotFound => "Item not found",
            Self::GoalAlreadyCompleted => "Goal already completed",
            Self::ClearInProgress => "History clear already in progress",
            Self::CacheWriteFailed => "Local cache write failed",
            Self::CacheEncodeFailed => "Local cache encode failed",
            Self::LockContention => "Lock contention",
            Self::RemoteUnavailable => "Remote store unavailable",
            Self::RemoteUnauthorized => "Not authorized",
            Self::RemoteRejected => "Remote store rejected the request",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .cadence/config.toml and retry."),
            Self::InvalidDayKey => Some("Use the YYYY-MM-DD format."),
            Self::ItemNotFound | Self::GoalAlreadyCompleted | Self::CacheEncodeFailed => None,
            Self::ClearInProgress => Some("Wait for the running clear to settle, then retry."),
            Self::CacheWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `cad` process releases its lock."),
            Self::RemoteUnavailable => {
                Some("Completions are kept locally; run `cad sync` once the server is reachable.")
            }
            Self::RemoteUnauthorized => Some("Set a valid token with --token or CADENCE_TOKEN."),
            Self::RemoteRejected => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
