//! Events emitted by the panel view-model
//!
//! One event per change of what a panel client renders: a confirmed device
//! reading, a new recognized transcript, or a transient error.

use serde::{Deserialize, Serialize};

use crate::device::Device;

/// Events broadcast to the IPC layer and subscribed clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelEvent {
    /// The store confirmed a new reading for a device
    DeviceChanged {
        device: Device,
        /// Reading as displayed, including "Unknown"
        value: String,
        /// Whether the device's switch renders in the checked position
        checked: bool,
    },

    /// A voice request produced text to display
    TranscriptRecognized { text: String },

    /// A voice request started listening
    VoiceRequestStarted { request_id: u64 },

    /// A voice request ended without text (cancelled or failed)
    VoiceRequestEnded { request_id: u64 },

    /// Recognition could not be launched or failed
    SpeechFailed { message: String },

    /// A store write did not go through; the reading is unchanged
    WriteFailed {
        device: Device,
        value: String,
        message: String,
    },
}

impl std::fmt::Display for PanelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelEvent::DeviceChanged { device, value, .. } => {
                write!(f, "DEVICE_CHANGED ({}={})", device, value)
            }
            PanelEvent::TranscriptRecognized { text } => {
                write!(f, "TRANSCRIPT_RECOGNIZED ({:?})", text)
            }
            PanelEvent::VoiceRequestStarted { request_id } => {
                write!(f, "VOICE_REQUEST_STARTED (#{})", request_id)
            }
            PanelEvent::VoiceRequestEnded { request_id } => {
                write!(f, "VOICE_REQUEST_ENDED (#{})", request_id)
            }
            PanelEvent::SpeechFailed { message } => write!(f, "SPEECH_FAILED ({})", message),
            PanelEvent::WriteFailed { device, value, .. } => {
                write!(f, "WRITE_FAILED ({}={})", device, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PanelEvent::DeviceChanged {
            device: Device::Window,
            value: "closed".to_string(),
            checked: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("device_changed"));
        assert!(json.contains("\"window\""));
        assert!(json.contains("closed"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"transcript_recognized","text":"light on"}"#;
        let event: PanelEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            PanelEvent::TranscriptRecognized {
                text: "light on".to_string()
            }
        );
    }

    #[test]
    fn test_display() {
        let event = PanelEvent::WriteFailed {
            device: Device::Light,
            value: "on".to_string(),
            message: "store is unavailable".to_string(),
        };
        assert_eq!(event.to_string(), "WRITE_FAILED (light=on)");
    }
}
