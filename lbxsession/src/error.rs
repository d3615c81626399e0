//! Error types for lbxsession.

/// Coordinator errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid payload")]
    InvalidPayload,

    #[error("Storage error: {0}")]
    Store(#[from] lbxstore::Error),

    #[error("Playback host error: {0}")]
    Host(String),
}

/// Specialized Result type for lbxsession.
pub type Result<T> = std::result::Result<T, Error>;
