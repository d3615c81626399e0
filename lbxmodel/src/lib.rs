//! # lbxmodel - Shared data model for Lullabox
//!
//! This crate defines the types every other Lullabox crate agrees on:
//! - **Track / TrackId** : a playable catalog entry and its stable identifier
//! - **SessionState** : the single source of truth for the playback session
//!   (queue, selection, playback flags), with all structural mutations
//! - **Protocol** : the closed command vocabulary exchanged between the
//!   coordinator, the playback host and the panels, plus the `Ack` reply shape
//!
//! # Architecture
//!
//! The session state is a plain owned struct: it holds no channels, no locks
//! and no I/O. Mutation is routed through its public operations so that the
//! queue invariants (id uniqueness, index always in range) live in exactly one
//! place. The coordinator in `lbxsession` is the only component that calls the
//! mutating operations.

mod protocol;
mod state;
mod track;

pub use protocol::{Ack, Command, Envelope, Target};
pub use state::{
    PlayPhase, Removal, RepeatMode, Selected, SessionState, StateDelta, DEFAULT_VOLUME,
};
pub use track::{Track, TrackId, TRACK_ID_LEN};
