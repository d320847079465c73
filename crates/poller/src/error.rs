use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A user-supplied configuration value was rejected. The stored
    /// configuration is left untouched.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A manual poll was requested while a cycle is in flight.
    #[error("a poll cycle is already running")]
    Busy,

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
