//! Transcript to device-write mapping
//!
//! Matching is a substring test against an ordered rule table on the
//! lower-cased transcript. The first matching rule wins.

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceState};

/// A single device write derived from a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub device: Device,
    pub state: DeviceState,
}

/// Ordered phrase rules. Order decides which rule wins when a transcript
/// contains more than one phrase.
pub const RULES: [(&str, Device, DeviceState); 6] = [
    ("door open", Device::Door, DeviceState::Open),
    ("door closed", Device::Door, DeviceState::Closed),
    ("light on", Device::Light, DeviceState::On),
    ("light off", Device::Light, DeviceState::Off),
    ("window open", Device::Window, DeviceState::Open),
    ("window closed", Device::Window, DeviceState::Closed),
];

/// Map a transcript to at most one device write
///
/// Returns `None` when no phrase matches; unrecognized speech is not an error.
pub fn interpret(transcript: &str) -> Option<Action> {
    let normalized = transcript.to_lowercase();

    RULES
        .iter()
        .find(|(phrase, _, _)| normalized.contains(phrase))
        .map(|&(_, device, state)| Action { device, state })
}
