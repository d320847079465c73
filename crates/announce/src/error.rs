use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The channel rejected the message (missing permissions, deleted
    /// channel, bad payload).
    #[error("delivery failed with HTTP {status}: {message}")]
    Delivery { status: u16, message: String },

    /// Still rate limited after the bounded retry budget.
    #[error("rate limited after {retries} retries")]
    RateLimited { retries: usize },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    #[must_use]
    pub fn delivery(status: u16, message: impl Into<String>) -> Self {
        Self::Delivery {
            status,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
