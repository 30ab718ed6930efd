//! Panel view-model
//!
//! Holds the last-known readings of the three devices, the last recognized
//! transcript, and the last surfaced error. Readings only change when the
//! store echoes a write back through its subscription.

mod snapshot;
mod view_model;

pub use view_model::{PanelCommand, PanelViewModel, IDLE_PROMPT};
