//! # lbxhost - Playback host controller for Lullabox
//!
//! The playback host owns exactly one embedded player surface at a time and
//! bridges the abstract command protocol to the embed's asynchronous
//! postMessage-style wire protocol. It also supervises liveness: the embed is
//! free to stall, pause itself, or silently refuse autoplay, and the host's
//! retry loop re-asserts the user's playback intent until the embed complies.
//!
//! # Architecture
//!
//! - [`wire`] : the narrow JSON slice of the embed protocol actually consumed
//! - [`EmbedSurface`] / [`SurfaceFactory`] : the transport seam; production
//!   code bridges to a real player, tests drive a [`ChannelSurface`]
//! - [`PlaybackHost`] : the spawned task, registered as the Offscreen bus
//!   endpoint

mod controller;
mod error;
mod surface;

pub mod wire;

pub use controller::{HostConfig, PlaybackHost, PlaybackHostHandle};
pub use error::{Error, Result};
pub use surface::{ChannelSurface, ChannelSurfaceFactory, EmbedSurface, SurfaceEnds, SurfaceFactory};
