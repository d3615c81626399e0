//! # lbxstore - Durable key-value store for Lullabox
//!
//! A small SQLite-backed store with JSON values. Every durable piece of the
//! session (queue, selection, volume, repeat, shuffle, mute, history) round
//! trips through here verbatim; readers supply a default and never see a
//! storage failure as anything worse than that default.

mod error;
mod store;

pub mod keys;

pub use error::{Error, Result};
pub use store::Store;
