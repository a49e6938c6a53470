use thiserror::Error;

/// Failure of a single upstream call. Callers decide whether it means "empty".
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Rate limiting, server errors, and connection trouble are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status(code) => *code == 429 || (500..600).contains(code),
            FetchError::Parse(_) => false,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse(e.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
