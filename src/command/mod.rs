//! Voice command interpretation

mod interpreter;

pub use interpreter::{interpret, Action};
