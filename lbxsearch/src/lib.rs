//! # lbxsearch - Catalog search client for Lullabox
//!
//! HTTP client for the video catalog's search endpoint. Results are filtered
//! down to playable entries (well-formed catalog id, embeddable) and mapped
//! into [`lbxmodel::Track`] values; the client over-fetches a small buffer so
//! filtering does not leave the caller short.
//!
//! # Example
//!
//! ```no_run
//! use lbxsearch::CatalogSearch;
//!
//! # async fn example() -> lbxsearch::Result<()> {
//! let search = CatalogSearch::new("api-key");
//! let tracks = search.search("lofi hip hop radio", None).await?;
//! for track in tracks {
//!     println!("{} — {}", track.title, track.channel);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::{CatalogSearch, SearchBuilder, DEFAULT_ENDPOINT, DEFAULT_MAX_RESULTS};
pub use error::{Error, Result};
