//! Error codes for the KME / Local KM API (§7).
//!
//! Add new codes here; never pass ad-hoc strings as error codes in a response body.
//! All codes are SCREAMING_SNAKE_CASE and map 1:1 to the strings that appear in
//! HTTP responses.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Size/number/body validation failure.
    ValidationError,
    /// Generic malformed request body.
    BadRequest,
    /// Peer/SAE resolver could not identify the caller and no fallback applied.
    UnknownSae,
    /// Requested key id(s) not present in store or pool.
    NotFound,
    /// Some but not all requested key ids were found.
    PartialResult,
    /// Pool drained past the acquire timeout.
    KeysUnavailable,
    /// A sync is already running.
    Busy,
    /// Duplicate SAE registration.
    AlreadyExists,
    /// Per-user pool drained below the requested count.
    InsufficientKeys,
    /// Internal peer endpoint invoked on a non-master role.
    Forbidden,
    /// Cross-KME or upstream HTTP transport failure.
    TransportError,
    /// Invalid configuration value (size, env var, etc.).
    ConfigError,
    /// Unclassified internal error.
    Internal,
    /// Database error.
    DbError,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::UnknownSae => "UNKNOWN_SAE",
            Self::NotFound => "NOT_FOUND",
            Self::PartialResult => "PARTIAL_RESULT",
            Self::KeysUnavailable => "KEYS_UNAVAILABLE",
            Self::Busy => "BUSY",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::InsufficientKeys => "INSUFFICIENT_KEYS",
            Self::Forbidden => "FORBIDDEN",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::Internal => "INTERNAL",
            Self::DbError => "DB_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_screaming_snake_case() {
        assert_eq!(ErrorCode::UnknownSae.as_str(), "UNKNOWN_SAE");
        assert_eq!(ErrorCode::KeysUnavailable.as_str(), "KEYS_UNAVAILABLE");
        assert_eq!(format!("{}", ErrorCode::Busy), "BUSY");
    }
}
