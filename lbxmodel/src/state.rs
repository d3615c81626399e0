//! Session state: the single source of truth for the playback session.
//!
//! All structural mutations (selection, queue edits, host-report merges) live
//! here so the invariants hold in exactly one place:
//! - queue ids are unique,
//! - `current_index` is `None` or a valid index into the queue,
//! - volume stays within 0..=100.

use serde::{Deserialize, Serialize};

use crate::track::{Track, TrackId};

/// Volume used when nothing has ever been persisted.
pub const DEFAULT_VOLUME: u16 = 50;

/// Repeat behavior once the current track finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// Advance to the next mode: Off -> All -> One -> Off.
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

/// Coarse playback phase as reported by the playback host.
///
/// The host folds every non-playing embed state into `Paused`; `ended`
/// travels as a separate flag on [`StateDelta`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayPhase {
    Playing,
    Paused,
}

/// Partial state update reported by the playback host.
///
/// Every field is optional: the host sends phase changes and time deliveries
/// as separate updates, and the coordinator merges whatever arrived into the
/// current in-memory state (last write wins, per field).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateDelta {
    #[serde(rename = "state", skip_serializing_if = "Option::is_none")]
    pub phase: Option<PlayPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
}

/// Outcome of [`SessionState::select_or_append`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selected {
    /// Index now selected.
    pub index: usize,
    /// True when the track was appended (and the queue must be persisted).
    pub appended: bool,
}

/// Outcome of [`SessionState::remove`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// A track was removed; any selection still points at a valid entry.
    Removed,
    /// The removed track was the last one: selection cleared, playback must stop.
    Emptied,
    /// No entry at this index; nothing changed.
    OutOfRange,
}

/// The playback session: queue, selection, playback flags.
///
/// `queue`, `current_index`, `volume`, `repeat_mode`, `is_shuffle` and
/// `is_muted` are durable (hydrated from and persisted to the store);
/// `is_playing`, `current_time` and `duration` are transient and restart as
/// not-playing / zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub queue: Vec<Track>,
    #[serde(with = "index_sentinel")]
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub repeat_mode: RepeatMode,
    pub is_shuffle: bool,
    pub volume: u16,
    pub is_muted: bool,
    pub current_time: f64,
    pub duration: f64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            current_index: None,
            is_playing: false,
            repeat_mode: RepeatMode::Off,
            is_shuffle: false,
            volume: DEFAULT_VOLUME,
            is_muted: false,
            current_time: 0.0,
            duration: 0.0,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of a track id in the queue, if present.
    pub fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.queue.iter().position(|t| &t.id == id)
    }

    /// The currently selected track, if any.
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.queue.get(i))
    }

    /// Select the track if its id is already queued, otherwise append it and
    /// select the new last entry. Never duplicates an id.
    pub fn select_or_append(&mut self, track: Track) -> Selected {
        if let Some(index) = self.position_of(&track.id) {
            self.current_index = Some(index);
            Selected {
                index,
                appended: false,
            }
        } else {
            self.queue.push(track);
            let index = self.queue.len() - 1;
            self.current_index = Some(index);
            Selected {
                index,
                appended: true,
            }
        }
    }

    /// Append a track if its id is absent. Returns false (and mutates
    /// nothing) on a duplicate id.
    pub fn enqueue(&mut self, track: Track) -> bool {
        if self.position_of(&track.id).is_some() {
            return false;
        }
        self.queue.push(track);
        true
    }

    /// Remove the entry at `index`, reconciling the selection:
    /// - removal before the selection shifts it down by one,
    /// - removing the selected entry clamps to the new last index (or clears
    ///   the selection and stops playback when the queue empties),
    /// - removal after the selection leaves it untouched.
    pub fn remove(&mut self, index: usize) -> Removal {
        if index >= self.queue.len() {
            return Removal::OutOfRange;
        }
        self.queue.remove(index);

        match self.current_index {
            Some(current) if index < current => {
                self.current_index = Some(current - 1);
                Removal::Removed
            }
            Some(current) if index == current => {
                if self.queue.is_empty() {
                    self.current_index = None;
                    self.is_playing = false;
                    Removal::Emptied
                } else {
                    if current >= self.queue.len() {
                        self.current_index = Some(self.queue.len() - 1);
                    }
                    Removal::Removed
                }
            }
            _ => Removal::Removed,
        }
    }

    /// Empty the queue and reset selection and transient fields.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.current_index = None;
        self.is_playing = false;
        self.current_time = 0.0;
        self.duration = 0.0;
    }

    /// Merge a host-reported partial update, last write wins per field.
    ///
    /// Touches only transient fields and the muted flag; queue, selection and
    /// the other persisted settings are never affected. Returns true when the
    /// update carries an end-of-track signal.
    pub fn merge_report(&mut self, delta: &StateDelta) -> bool {
        if let Some(time) = delta.current_time {
            self.current_time = time;
        }
        if let Some(duration) = delta.duration {
            self.duration = duration;
        }
        if let Some(muted) = delta.is_muted {
            self.is_muted = muted;
        }
        if let Some(phase) = delta.phase {
            self.is_playing = phase == PlayPhase::Playing;
        }
        delta.ended == Some(true)
    }

    /// Restart hygiene after hydration: an out-of-range persisted index
    /// falls back to the first entry (or to no selection on an empty queue).
    pub fn clamp_index(&mut self) {
        if let Some(index) = self.current_index {
            if index >= self.queue.len() {
                self.current_index = if self.queue.is_empty() { None } else { Some(0) };
            }
        }
    }
}

/// `current_index` crosses the wire and the store as an integer where `-1`
/// means "no selection".
mod index_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<usize>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(i) => ser.serialize_i64(*i as i64),
            None => ser.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<usize>, D::Error> {
        let raw = i64::deserialize(de)?;
        Ok(usize::try_from(raw).ok())
    }
}
