//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceReading};
use crate::events::PanelEvent;
use crate::speech::Recognition;
use crate::state::{PanelCommand, IDLE_PROMPT};

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from a panel client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request the current panel view
    GetStatus,

    /// Flip a device switch
    Toggle { device: Device, checked: bool },

    /// Start listening through the daemon's speech service
    StartVoiceCommand,

    /// Deliver a recognition result produced on the client.
    /// An empty list means the recognizer finished without text.
    SubmitTranscript { transcripts: Vec<String> },

    /// Ping to check connectivity
    Ping,

    /// Subscribe to panel event notifications
    Subscribe,
}

impl Request {
    /// The view-model command this request forwards, if any
    pub fn into_command(self) -> Option<PanelCommand> {
        match self {
            Request::Toggle { device, checked } => Some(PanelCommand::Toggle { device, checked }),
            Request::StartVoiceCommand => Some(PanelCommand::StartVoiceCommand),
            Request::SubmitTranscript { transcripts } => Some(PanelCommand::SubmitRecognition(
                Recognition::Transcripts(transcripts),
            )),
            Request::GetStatus | Request::Ping | Request::Subscribe => None,
        }
    }
}

/// Responses from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current panel view
    Status(PanelStatus),

    /// The request was queued for the view-model
    Accepted,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "event", rename_all = "snake_case")]
pub enum Notification {
    PanelEvent(PanelEvent),
}

/// One device row as rendered by a panel client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRow {
    /// Reading as displayed, "Unknown" until loaded
    pub value: String,
    /// Switch position
    pub checked: bool,
}

impl Default for DeviceRow {
    fn default() -> Self {
        Self {
            value: DeviceReading::Unknown.to_string(),
            checked: false,
        }
    }
}

/// What a panel client renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelStatus {
    /// Daemon version
    pub version: String,

    /// One row per device key
    pub devices: BTreeMap<String, DeviceRow>,

    /// Last recognized transcript, or the idle prompt
    pub recognized_text: String,

    /// Last transient error shown to the user
    pub last_error: Option<String>,

    /// Whether a voice request is listening
    pub voice_pending: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for PanelStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            devices: Device::ALL
                .into_iter()
                .map(|d| (d.key().to_string(), DeviceRow::default()))
                .collect(),
            recognized_text: IDLE_PROMPT.to_string(),
            last_error: None,
            voice_pending: false,
            uptime_secs: 0,
        }
    }
}

impl PanelStatus {
    /// Fold a panel event into the view
    pub fn apply(&mut self, event: &PanelEvent) {
        match event {
            PanelEvent::DeviceChanged {
                device,
                value,
                checked,
            } => {
                self.devices.insert(
                    device.key().to_string(),
                    DeviceRow {
                        value: value.clone(),
                        checked: *checked,
                    },
                );
            }
            PanelEvent::TranscriptRecognized { text } => {
                self.recognized_text = text.clone();
                self.voice_pending = false;
            }
            PanelEvent::VoiceRequestStarted { .. } => self.voice_pending = true,
            PanelEvent::VoiceRequestEnded { .. } => self.voice_pending = false,
            PanelEvent::SpeechFailed { message } | PanelEvent::WriteFailed { message, .. } => {
                self.last_error = Some(message.clone());
            }
        }
    }
}

/// Errors while framing or decoding messages
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message of {0} bytes exceeds the limit")]
    TooLarge(usize),

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Stable code sent to clients in [`Response::Error`]
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::TooLarge(_) => "too_large",
            ProtocolError::Malformed(_) => "malformed_request",
            ProtocolError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::Toggle {
            device: Device::Light,
            checked: true,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"toggle\""));
        assert!(json.contains("\"light\""));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"type":"submit_transcript","transcripts":["door open"]}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(
            req.into_command(),
            Some(PanelCommand::SubmitRecognition(Recognition::Transcripts(t))) if t == ["door open"]
        ));
    }

    #[test]
    fn test_unknown_device_rejected() {
        let json = r#"{"type":"toggle","device":"garage","checked":true}"#;
        assert!(serde_json::from_str::<Request>(json).is_err());
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(PanelStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("Unknown"));
    }

    #[test]
    fn test_notification_serialization() {
        let note = Notification::PanelEvent(PanelEvent::TranscriptRecognized {
            text: "light on".to_string(),
        });
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], "panel_event");
        assert_eq!(value["event"]["type"], "transcript_recognized");
    }

    #[test]
    fn test_status_follows_events() {
        let mut status = PanelStatus::default();

        status.apply(&PanelEvent::VoiceRequestStarted { request_id: 1 });
        assert!(status.voice_pending);

        status.apply(&PanelEvent::TranscriptRecognized {
            text: "door open".to_string(),
        });
        status.apply(&PanelEvent::DeviceChanged {
            device: Device::Door,
            value: "open".to_string(),
            checked: true,
        });
        status.apply(&PanelEvent::WriteFailed {
            device: Device::Light,
            value: "on".to_string(),
            message: "store is unavailable".to_string(),
        });

        assert!(!status.voice_pending);
        assert_eq!(status.recognized_text, "door open");
        assert_eq!(status.devices["door"].value, "open");
        assert!(status.devices["door"].checked);
        assert_eq!(status.devices["light"], DeviceRow::default());
        assert_eq!(status.last_error.as_deref(), Some("store is unavailable"));
    }
}
