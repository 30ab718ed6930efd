//! Device definitions and their closed state domains
//!
//! Each device has exactly two valid states. The toggle table maps a switch
//! position to the value written for that device.

use serde::{Deserialize, Serialize};

/// Switch position to written value, per device
pub mod toggle {
    use super::{Device, DeviceState};

    /// (device, value when checked, value when unchecked)
    pub const TABLE: [(Device, DeviceState, DeviceState); 3] = [
        (Device::Door, DeviceState::Open, DeviceState::Closed),
        (Device::Light, DeviceState::On, DeviceState::Off),
        (Device::Window, DeviceState::Open, DeviceState::Closed),
    ];
}

/// A controllable device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Door,
    Light,
    Window,
}

impl Device {
    /// All devices, in display order
    pub const ALL: [Device; 3] = [Device::Door, Device::Light, Device::Window];

    /// Key under which the store holds this device's state
    pub fn key(self) -> &'static str {
        match self {
            Device::Door => "door",
            Device::Light => "light",
            Device::Window => "window",
        }
    }

    /// The two valid states for this device
    pub fn domain(self) -> [DeviceState; 2] {
        let (_, on, off) = self.toggle_entry();
        [on, off]
    }

    /// Value to write when the device's switch is flipped
    pub fn toggle_value(self, checked: bool) -> DeviceState {
        let (_, on, off) = self.toggle_entry();
        if checked {
            on
        } else {
            off
        }
    }

    /// Parse a stored string as a state of this device
    ///
    /// Returns `None` for strings outside the device's domain.
    pub fn parse_state(self, raw: &str) -> Option<DeviceState> {
        self.domain().into_iter().find(|s| s.as_str() == raw)
    }

    fn toggle_entry(self) -> (Device, DeviceState, DeviceState) {
        // TABLE covers every variant
        toggle::TABLE
            .into_iter()
            .find(|(device, _, _)| *device == self)
            .unwrap_or((self, DeviceState::Open, DeviceState::Closed))
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Device {
    type Err = UnknownDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Device::ALL
            .into_iter()
            .find(|d| d.key() == s)
            .ok_or_else(|| UnknownDevice(s.to_string()))
    }
}

/// Raised when a name does not match any device
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device: {0}")]
pub struct UnknownDevice(pub String);

/// A concrete device state as written to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Open,
    Closed,
    On,
    Off,
}

impl DeviceState {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceState::Open => "open",
            DeviceState::Closed => "closed",
            DeviceState::On => "on",
            DeviceState::Off => "off",
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the panel currently shows for a device
///
/// `Unknown` means "not yet loaded" and is never written back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceReading {
    #[default]
    Unknown,
    Known(DeviceState),
}

impl DeviceReading {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceReading::Unknown => "Unknown",
            DeviceReading::Known(state) => state.as_str(),
        }
    }

    /// Whether the switch for this reading renders in the checked position
    pub fn is_checked(self, device: Device) -> bool {
        self == DeviceReading::Known(device.toggle_value(true))
    }
}

impl std::fmt::Display for DeviceReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeviceReading {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_toggle() {
        assert_eq!(Device::Light.toggle_value(true), DeviceState::On);
        assert_eq!(Device::Light.toggle_value(false), DeviceState::Off);
    }

    #[test]
    fn test_door_and_window_toggle() {
        for device in [Device::Door, Device::Window] {
            assert_eq!(device.toggle_value(true), DeviceState::Open);
            assert_eq!(device.toggle_value(false), DeviceState::Closed);
        }
    }

    #[test]
    fn test_parse_state_respects_domain() {
        assert_eq!(Device::Door.parse_state("open"), Some(DeviceState::Open));
        assert_eq!(Device::Light.parse_state("off"), Some(DeviceState::Off));
        assert_eq!(Device::Light.parse_state("open"), None);
        assert_eq!(Device::Window.parse_state("on"), None);
        assert_eq!(Device::Door.parse_state("Open"), None);
    }

    #[test]
    fn test_device_from_str() {
        assert_eq!("window".parse::<Device>(), Ok(Device::Window));
        assert!("garage".parse::<Device>().is_err());
    }

    #[test]
    fn test_reading_display_and_checked() {
        assert_eq!(DeviceReading::Unknown.to_string(), "Unknown");
        assert!(DeviceReading::Known(DeviceState::On).is_checked(Device::Light));
        assert!(!DeviceReading::Known(DeviceState::Closed).is_checked(Device::Door));
        assert!(!DeviceReading::Unknown.is_checked(Device::Window));
    }

    #[test]
    fn test_reading_serializes_as_string() {
        let json = serde_json::to_string(&DeviceReading::Known(DeviceState::Open)).unwrap();
        assert_eq!(json, "\"open\"");
        let json = serde_json::to_string(&DeviceReading::Unknown).unwrap();
        assert_eq!(json, "\"Unknown\"");
    }
}
