//! Device state store
//!
//! The store is a key-value map from device key to a string state with
//! push-based change notification. Every subscriber receives the full record
//! after each change.

mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::device::Device;

pub use memory::MemoryStore;

/// One store snapshot; fields may be missing or hold non-string values
pub type StoreRecord = serde_json::Map<String, serde_json::Value>;

/// Errors reported by a store backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store is unavailable")]
    Unavailable,

    #[error("write to {device} rejected: {reason}")]
    Rejected { device: Device, reason: String },
}

/// Backend holding the authoritative device state
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Read the current record
    async fn get(&self) -> Result<StoreRecord, StoreError>;

    /// Write one device's state. Subscribers are notified on success.
    async fn set(&self, device: Device, value: &str) -> Result<(), StoreError>;

    /// Receive every record published after this call
    fn subscribe(&self) -> broadcast::Receiver<StoreRecord>;
}
