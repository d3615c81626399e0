//! Wire codec for the embed's postMessage protocol.
//!
//! Only the narrow slice the host depends on is modeled:
//! - outbound `command` frames (`loadVideoById`, `playVideo`, ...),
//! - the `listening` handshake probe,
//! - inbound readiness (`onReady` / `initialDelivery`) and `infoDelivery`
//!   events carrying a coarse player state and an optional error code.
//!
//! Frames share the transport with foreign traffic; anything that does not
//! parse as one of the known events is ignored.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use lbxmodel::TrackId;

/// Embed player state codes from `infoDelivery`.
pub const STATE_ENDED: i64 = 0;
pub const STATE_PLAYING: i64 = 1;
pub const STATE_PAUSED: i64 = 2;
pub const STATE_BUFFERING: i64 = 3;

/// Player functions the host invokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerFunc {
    LoadVideoById,
    PlayVideo,
    PauseVideo,
    StopVideo,
    Mute,
    UnMute,
    SetVolume,
    SeekTo,
}

/// Outbound `{"event":"command", "func":..., "args":[...]}` frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandFrame {
    pub event: String,
    pub func: PlayerFunc,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CommandFrame {
    pub fn new(func: PlayerFunc, args: Vec<Value>) -> Self {
        Self {
            event: "command".to_string(),
            func,
            args,
        }
    }

    /// Load a video by catalog id, starting at the beginning in the lowest
    /// quality that keeps audio intact.
    pub fn load_video(id: &TrackId) -> Self {
        Self::new(
            PlayerFunc::LoadVideoById,
            vec![json!({
                "videoId": id.as_str(),
                "startSeconds": 0,
                "suggestedQuality": "small",
            })],
        )
    }

    pub fn play() -> Self {
        Self::new(PlayerFunc::PlayVideo, Vec::new())
    }

    pub fn pause() -> Self {
        Self::new(PlayerFunc::PauseVideo, Vec::new())
    }

    pub fn stop() -> Self {
        Self::new(PlayerFunc::StopVideo, Vec::new())
    }

    pub fn mute() -> Self {
        Self::new(PlayerFunc::Mute, Vec::new())
    }

    pub fn unmute() -> Self {
        Self::new(PlayerFunc::UnMute, Vec::new())
    }

    pub fn set_volume(volume: u16) -> Self {
        Self::new(PlayerFunc::SetVolume, vec![json!(volume)])
    }

    pub fn seek_to(seconds: f64) -> Self {
        Self::new(PlayerFunc::SeekTo, vec![json!(seconds), json!(true)])
    }

    pub fn encode(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The repeated "are you listening" probe sent until the embed answers.
pub fn listening_probe() -> String {
    json!({ "event": "listening", "id": 1, "channel": "widget" }).to_string()
}

/// Parsed inbound event.
#[derive(Clone, Debug, PartialEq)]
pub enum EmbedEvent {
    /// `onReady` or `initialDelivery`: the embed is listening.
    Ready,
    /// `infoDelivery`: state, time and error reporting.
    Info(InfoDelivery),
}

/// Payload of an `infoDelivery` event. All fields optional; the embed sends
/// state changes and time updates in separate frames.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InfoDelivery {
    pub player_state: Option<i64>,
    pub current_time: Option<f64>,
    pub duration: Option<f64>,
    pub muted: Option<bool>,
    pub error: Option<i64>,
}

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    info: Option<InfoDelivery>,
}

/// Parse an inbound frame. Returns `None` for foreign or malformed traffic.
pub fn parse_event(raw: &str) -> Option<EmbedEvent> {
    let parsed: RawEvent = serde_json::from_str(raw).ok()?;
    match parsed.event.as_str() {
        "onReady" | "initialDelivery" => Some(EmbedEvent::Ready),
        "infoDelivery" => Some(EmbedEvent::Info(parsed.info.unwrap_or_default())),
        _ => None,
    }
}

/// Map an embed error code to a user-facing message. Known restriction codes
/// get a specific explanation, everything else passes through generically.
pub fn error_message(code: i64) -> String {
    match code {
        101 | 150 => "Playback blocked (embedding restricted)".to_string(),
        _ => format!("Player error {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_frames_encode_the_embed_protocol() {
        let frame = CommandFrame::load_video(&TrackId::new("dQw4w9WgXcQ"));
        let json: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["event"], "command");
        assert_eq!(json["func"], "loadVideoById");
        assert_eq!(json["args"][0]["videoId"], "dQw4w9WgXcQ");
        assert_eq!(json["args"][0]["startSeconds"], 0);

        let frame = CommandFrame::unmute();
        let json: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["func"], "unMute");

        let frame = CommandFrame::seek_to(42.5);
        let json: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["func"], "seekTo");
        assert_eq!(json["args"][0], 42.5);
        assert_eq!(json["args"][1], true);
    }

    #[test]
    fn readiness_events_parse() {
        assert_eq!(parse_event(r#"{"event":"onReady"}"#), Some(EmbedEvent::Ready));
        assert_eq!(
            parse_event(r#"{"event":"initialDelivery","info":{}}"#),
            Some(EmbedEvent::Ready)
        );
    }

    #[test]
    fn info_delivery_parses_partial_payloads() {
        let event = parse_event(
            r#"{"event":"infoDelivery","info":{"playerState":2,"currentTime":10.5}}"#,
        )
        .unwrap();
        let EmbedEvent::Info(info) = event else {
            panic!("expected info");
        };
        assert_eq!(info.player_state, Some(STATE_PAUSED));
        assert_eq!(info.current_time, Some(10.5));
        assert_eq!(info.error, None);
    }

    #[test]
    fn foreign_traffic_is_ignored() {
        assert_eq!(parse_event("not json"), None);
        assert_eq!(parse_event(r#"{"event":"somethingElse"}"#), None);
        assert_eq!(parse_event(r#"{"no_event":true}"#), None);
    }

    #[test]
    fn restriction_codes_map_to_a_specific_message() {
        assert_eq!(error_message(150), "Playback blocked (embedding restricted)");
        assert_eq!(error_message(101), "Playback blocked (embedding restricted)");
        assert_eq!(error_message(2), "Player error 2");
    }
}
