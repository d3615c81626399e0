//! Error types for lbxsearch.

/// Search client errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No API key configured")]
    MissingApiKey,

    #[error("Search API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Specialized Result type for lbxsearch.
pub type Result<T> = std::result::Result<T, Error>;
