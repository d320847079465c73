use thiserror::Error;

/// Failures talking to the leaderboard API, split by whether retrying
/// the same request later can reasonably succeed.
#[derive(Debug, Error)]
pub enum Error {
    /// Rate limiting, server errors, transport failures.
    #[error("transient leaderboard error: {message}")]
    Transient { message: String },

    /// Bad request, unknown resource, malformed response body.
    #[error("permanent leaderboard error: {message}")]
    Permanent { message: String },
}

impl Error {
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Whether a later retry of the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
