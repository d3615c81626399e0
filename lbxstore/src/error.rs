//! Error types for lbxstore.

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Storage error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Specialized Result type for lbxstore.
pub type Result<T> = std::result::Result<T, Error>;
