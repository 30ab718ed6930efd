//! Daemon lifecycle

mod shutdown;

pub use shutdown::ShutdownSignal;
