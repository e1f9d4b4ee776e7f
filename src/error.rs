use thiserror::Error;

/// Feed error
#[derive(Debug, Error)]
pub enum FeedError {
    /// The entry source could not deliver a snapshot
    #[error("Subscription failed: {0}")]
    Subscription(String),

    /// A remote mutation was rejected or never completed
    #[error("Mutation on {id} failed: {message}")]
    Mutation { id: String, message: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local database failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The hosted store answered with an error status
    #[error("Store error {status}: {message}")]
    Store { status: u16, message: String },

    /// A stored document could not be decoded into an entry
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Admin input rejected before reaching the store
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Local viewer state could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Entry not found
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Bad configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl FeedError {
    /// Whether the caller may simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Subscription(_) | FeedError::Mutation { .. } | FeedError::Http(_) => true,
            FeedError::Store { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;
