//! Last-known device readings

use serde_json::Value;

use crate::device::{Device, DeviceReading};
use crate::store::StoreRecord;

/// Readings for all three devices, `Unknown` until loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    door: DeviceReading,
    light: DeviceReading,
    window: DeviceReading,
}

impl DeviceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device: Device) -> DeviceReading {
        match device {
            Device::Door => self.door,
            Device::Light => self.light,
            Device::Window => self.window,
        }
    }

    fn slot(&mut self, device: Device) -> &mut DeviceReading {
        match device {
            Device::Door => &mut self.door,
            Device::Light => &mut self.light,
            Device::Window => &mut self.window,
        }
    }

    /// Apply a store notification, returning the readings that changed
    ///
    /// An absent field keeps its previous reading. A field that is not a
    /// string, or holds a string outside the device's domain, reads as
    /// `Unknown`.
    pub fn apply(&mut self, record: &StoreRecord) -> Vec<(Device, DeviceReading)> {
        let mut changed = Vec::new();

        for device in Device::ALL {
            let Some(raw) = record.get(device.key()) else {
                continue;
            };
            let reading = read_field(device, raw);

            let slot = self.slot(device);
            if *slot != reading {
                *slot = reading;
                changed.push((device, reading));
            }
        }

        changed
    }

    /// Readings in display order
    pub fn iter(&self) -> impl Iterator<Item = (Device, DeviceReading)> + '_ {
        Device::ALL.into_iter().map(|d| (d, self.get(d)))
    }
}

fn read_field(device: Device, raw: &Value) -> DeviceReading {
    raw.as_str()
        .and_then(|s| device.parse_state(s))
        .map(DeviceReading::Known)
        .unwrap_or(DeviceReading::Unknown)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::device::DeviceState;

    fn record(value: Value) -> StoreRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    #[test]
    fn test_initially_unknown() {
        let snapshot = DeviceSnapshot::new();
        for (_, reading) in snapshot.iter() {
            assert_eq!(reading, DeviceReading::Unknown);
        }
    }

    #[test]
    fn test_first_load_with_missing_fields() {
        let mut snapshot = DeviceSnapshot::new();
        let changed = snapshot.apply(&record(json!({ "door": "open" })));

        assert_eq!(changed, vec![(Device::Door, DeviceReading::Known(DeviceState::Open))]);
        assert_eq!(snapshot.get(Device::Light), DeviceReading::Unknown);
        assert_eq!(snapshot.get(Device::Window), DeviceReading::Unknown);
    }

    #[test]
    fn test_missing_field_keeps_previous_reading() {
        let mut snapshot = DeviceSnapshot::new();
        snapshot.apply(&record(json!({ "door": "closed", "light": "on", "window": "open" })));

        let changed = snapshot.apply(&record(json!({ "door": "open" })));

        assert_eq!(changed.len(), 1);
        assert_eq!(snapshot.get(Device::Door), DeviceReading::Known(DeviceState::Open));
        assert_eq!(snapshot.get(Device::Light), DeviceReading::Known(DeviceState::On));
        assert_eq!(snapshot.get(Device::Window), DeviceReading::Known(DeviceState::Open));
    }

    #[test]
    fn test_non_string_field_reads_unknown() {
        let mut snapshot = DeviceSnapshot::new();
        snapshot.apply(&record(json!({ "light": "on" })));

        let changed = snapshot.apply(&record(json!({ "light": true })));

        assert_eq!(changed, vec![(Device::Light, DeviceReading::Unknown)]);
    }

    #[test]
    fn test_out_of_domain_string_reads_unknown() {
        let mut snapshot = DeviceSnapshot::new();
        snapshot.apply(&record(json!({ "window": "on", "door": "ajar" })));

        assert_eq!(snapshot.get(Device::Window), DeviceReading::Unknown);
        assert_eq!(snapshot.get(Device::Door), DeviceReading::Unknown);
    }

    #[test]
    fn test_unchanged_values_not_reported() {
        let mut snapshot = DeviceSnapshot::new();
        snapshot.apply(&record(json!({ "door": "open" })));
        let changed = snapshot.apply(&record(json!({ "door": "open", "light": "off" })));
        assert_eq!(changed, vec![(Device::Light, DeviceReading::Known(DeviceState::Off))]);
    }
}
