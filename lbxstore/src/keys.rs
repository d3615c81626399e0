//! Key names for the durable session fields.
//!
//! These names are an external contract: values written under them round
//! trip verbatim (no transformation), and an absent key yields the caller's
//! default.

/// Ordered queue of tracks.
pub const QUEUE: &str = "queue";
/// Selected index, `-1` when nothing is selected.
pub const CURRENT_INDEX: &str = "current-index";
/// Volume, 0..=100.
pub const VOLUME: &str = "volume";
/// Repeat mode (`"OFF"` / `"ALL"` / `"ONE"`).
pub const REPEAT: &str = "repeat-mode";
/// Shuffle flag.
pub const SHUFFLE: &str = "shuffle";
/// Mute flag.
pub const MUTED: &str = "muted";
/// Capped play history, owned by panels.
pub const HISTORY: &str = "history";
