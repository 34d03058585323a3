use std::fmt;

/// Machine-readable error codes for scheduler-friendly failure handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingCredential,
    ConfigParseError,
    InvalidConfig,
    InvalidSeriesId,
    FetchExhausted,
    MalformedPayload,
    HistoryReadFailed,
    HistoryCorrupt,
    HistoryWriteFailed,
    LockContention,
    ContestNotFound,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingCredential => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidConfig => "E1003",
            Self::InvalidSeriesId => "E1004",
            Self::FetchExhausted => "E2001",
            Self::MalformedPayload => "E2002",
            Self::HistoryReadFailed => "E3001",
            Self::HistoryCorrupt => "E3002",
            Self::HistoryWriteFailed => "E3003",
            Self::LockContention => "E3004",
            Self::ContestNotFound => "E4001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingCredential => "Remote API credential not configured",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfig => "Invalid configuration value",
            Self::InvalidSeriesId => "Invalid series identifier",
            Self::FetchExhausted => "Remote fetch exhausted its retries",
            Self::MalformedPayload => "Remote payload could not be normalized",
            Self::HistoryReadFailed => "History file read failed",
            Self::HistoryCorrupt => "History file is corrupt",
            Self::HistoryWriteFailed => "History file write failed",
            Self::LockContention => "Lock contention",
            Self::ContestNotFound => "Contest not found in local history",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingCredential => {
                Some("Export LOT_TOKEN (or pass --token) with the remote API token.")
            }
            Self::ConfigParseError => Some("Fix syntax in drawsync.toml and retry."),
            Self::InvalidConfig => Some("Check drawsync.toml and the DRAWSYNC_* environment."),
            Self::InvalidSeriesId => Some("Use a non-empty series key such as `megasena`."),
            Self::FetchExhausted => {
                Some("Local history was left untouched; rerun once the remote API recovers.")
            }
            Self::MalformedPayload => None,
            Self::HistoryReadFailed => Some("Check read permissions on the output directory."),
            Self::HistoryCorrupt => {
                Some("Restore the file from version control or delete it to resync from scratch.")
            }
            Self::HistoryWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => {
                Some("Retry after the other `drawsync` process releases its lock.")
            }
            Self::ContestNotFound => Some("Run `drawsync sync` or widen the retention window."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 11] = [
        ErrorCode::MissingCredential,
        ErrorCode::ConfigParseError,
        ErrorCode::InvalidConfig,
        ErrorCode::InvalidSeriesId,
        ErrorCode::FetchExhausted,
        ErrorCode::MalformedPayload,
        ErrorCode::HistoryReadFailed,
        ErrorCode::HistoryCorrupt,
        ErrorCode::HistoryWriteFailed,
        ErrorCode::LockContention,
        ErrorCode::ContestNotFound,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let text = code.code();
            assert_eq!(text.len(), 5);
            assert!(text.starts_with('E'));
            assert!(text.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn credential_hint_names_the_variable() {
        let hint = ErrorCode::MissingCredential.hint().unwrap_or_default();
        assert!(hint.contains("LOT_TOKEN"));
    }
}
