//! Error types for lbxhost.

/// Playback host errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Playback surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Surface transport closed")]
    SurfaceClosed,

    #[error("Wire encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Specialized Result type for lbxhost.
pub type Result<T> = std::result::Result<T, Error>;
