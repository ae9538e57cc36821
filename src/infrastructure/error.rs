use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Rule update rejected: {0}")]
    RuleUpdate(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Channel closed: {0}")]
    Channel(String),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Why a summarization produced no usable text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummarizeError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("model returned no candidate text")]
    EmptyResponse,
}

impl SummarizeError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::EmptyResponse => "empty_response",
        }
    }
}
