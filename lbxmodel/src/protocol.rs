//! Command protocol between the coordinator, the playback host and panels.
//!
//! The action vocabulary is a closed set. Every message is an [`Envelope`]:
//! a delivery target plus a typed command; replies are [`Ack`] values. The
//! wire encoding is stable JSON (`action` / `payload` adjacent tagging) so
//! external surfaces can speak it verbatim.

use serde::{Deserialize, Serialize};

use crate::state::{SessionState, StateDelta};
use crate::track::Track;

/// Logical delivery endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// The session coordinator.
    Background,
    /// The playback host.
    Offscreen,
    /// Any number of transient panels.
    Popup,
}

/// The closed command set.
///
/// Payload shapes depend on direction: `PLAY_NEW` carries a track from a
/// panel and `None` when the coordinator tells the host to stop;
/// `TOGGLE_MUTE` is payload-free from panels and carries the resolved flag
/// toward the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    PlayNew(Option<Track>),
    TogglePlay,
    NextTrack,
    PrevTrack,
    Seek { time: f64 },
    ToggleRepeat,
    ToggleShuffle,
    ToggleMute { mute: Option<bool> },
    SetVolume { volume: u16 },
    GetCurrentState,
    AddToQueue(Track),
    RemoveFromQueue { index: i64 },
    ClearQueue,
    OffscreenReady,
    OffscreenStateUpdate(StateDelta),
    SyncUi(SessionState),
    ShowError { message: String },
}

impl Command {
    /// Wire name of the action, for logging.
    pub fn action_name(&self) -> &'static str {
        match self {
            Command::PlayNew(_) => "PLAY_NEW",
            Command::TogglePlay => "TOGGLE_PLAY",
            Command::NextTrack => "NEXT_TRACK",
            Command::PrevTrack => "PREV_TRACK",
            Command::Seek { .. } => "SEEK",
            Command::ToggleRepeat => "TOGGLE_REPEAT",
            Command::ToggleShuffle => "TOGGLE_SHUFFLE",
            Command::ToggleMute { .. } => "TOGGLE_MUTE",
            Command::SetVolume { .. } => "SET_VOLUME",
            Command::GetCurrentState => "GET_CURRENT_STATE",
            Command::AddToQueue(_) => "ADD_TO_QUEUE",
            Command::RemoveFromQueue { .. } => "REMOVE_FROM_QUEUE",
            Command::ClearQueue => "CLEAR_QUEUE",
            Command::OffscreenReady => "OFFSCREEN_READY",
            Command::OffscreenStateUpdate(_) => "OFFSCREEN_STATE_UPDATE",
            Command::SyncUi(_) => "SYNC_UI",
            Command::ShowError { .. } => "SHOW_ERROR",
        }
    }
}

/// An addressed command: the unit of bus delivery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub target: Target,
    #[serde(flatten)]
    pub command: Command,
}

impl Envelope {
    pub fn to_background(command: Command) -> Self {
        Self {
            target: Target::Background,
            command,
        }
    }

    pub fn to_offscreen(command: Command) -> Self {
        Self {
            target: Target::Offscreen,
            command,
        }
    }

    pub fn to_popup(command: Command) -> Self {
        Self {
            target: Target::Popup,
            command,
        }
    }
}

/// Reply shape for commands.
///
/// Mirrors the coordinator's observable contract: `{success}` plus the
/// per-operation fields callers key on (`played`, `added`, `reason`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub played: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn played() -> Self {
        Self {
            success: true,
            played: Some(true),
            ..Default::default()
        }
    }

    pub fn added() -> Self {
        Self {
            success: true,
            added: Some(true),
            ..Default::default()
        }
    }

    /// Soft rejection of a duplicate queue insertion.
    pub fn duplicate() -> Self {
        Self {
            success: true,
            added: Some(false),
            reason: Some("duplicate".to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wire_shape() {
        let env = Envelope::to_background(Command::SetVolume { volume: 70 });
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["target"], "background");
        assert_eq!(json["action"], "SET_VOLUME");
        assert_eq!(json["payload"]["volume"], 70);

        let back: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn unit_commands_omit_payload() {
        let env = Envelope::to_offscreen(Command::TogglePlay);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["action"], "TOGGLE_PLAY");
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn play_new_stop_carries_null_payload() {
        let env = Envelope::to_offscreen(Command::PlayNew(None));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["action"], "PLAY_NEW");
        assert!(json["payload"].is_null());
    }

    #[test]
    fn ack_constructors() {
        assert!(Ack::ok().success);
        let dup = Ack::duplicate();
        assert!(dup.success);
        assert_eq!(dup.added, Some(false));
        assert_eq!(dup.reason.as_deref(), Some("duplicate"));
        let err = Ack::err("Invalid payload");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("Invalid payload"));
    }
}
