//! Error types for the DayPack library.
//!
//! Only the `Invalid*` variants ever reach a caller. Source and delivery
//! failures are recovered where they happen (empty contribution, dropped
//! token) and exist here so they can be logged with context.

use thiserror::Error;

/// Errors raised by timeline construction, capability adapters and the
/// device registry.
#[derive(Error, Debug)]
pub enum DaypackError {
    /// Date string is not `YYYY-MM-DD` (or an ISO date-time).
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Timezone is not a known IANA identifier.
    #[error("invalid timezone '{0}': expected an IANA zone such as Australia/Brisbane")]
    InvalidTimezone(String),

    /// Latitude or longitude outside the valid range.
    #[error("invalid coordinates lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    /// Empty or whitespace-only device token.
    #[error("device token must not be empty")]
    InvalidToken,

    /// An external capability timed out, failed or returned garbage.
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable {
        source_name: &'static str,
        reason: String,
    },

    /// The push service refused the device token itself. The token will
    /// never work again and should be forgotten.
    #[error("device token rejected: {reason}")]
    TokenRejected { reason: String },

    /// A push notification could not be delivered for a reason unrelated to
    /// the token (auth, server error, transport).
    #[error("delivery failed: {reason}")]
    Delivery { reason: String },

    /// Push credentials could not be loaded or used.
    #[error("invalid push credentials: {0}")]
    Credentials(String),
}

impl DaypackError {
    // ---

    /// Build a `SourceUnavailable` from any displayable cause.
    pub fn unavailable(source_name: &'static str, reason: impl std::fmt::Display) -> Self {
        DaypackError::SourceUnavailable {
            source_name,
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by the caller's input (rejected, not retried).
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            DaypackError::InvalidDate(_)
                | DaypackError::InvalidTimezone(_)
                | DaypackError::InvalidCoordinates { .. }
                | DaypackError::InvalidToken
        )
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DaypackError>;
