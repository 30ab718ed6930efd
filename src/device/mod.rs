//! Device model
//!
//! Three binary devices (door, light, window) with closed state domains
//! and a loading sentinel for the panel display.

mod kinds;

pub use kinds::{Device, DeviceReading, DeviceState};
