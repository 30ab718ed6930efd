//! In-process store backend

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::device::{Device, DeviceState};

use super::{DeviceStore, StoreError, StoreRecord};

/// Store kept in memory, shared by every connected panel
pub struct MemoryStore {
    record: RwLock<StoreRecord>,
    change_tx: broadcast::Sender<StoreRecord>,
    online: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            record: RwLock::new(StoreRecord::new()),
            change_tx,
            online: AtomicBool::new(true),
        }
    }

    /// Create a store pre-populated with the given states
    pub fn with_states(states: &[(Device, DeviceState)]) -> Self {
        let record: StoreRecord = states
            .iter()
            .map(|(device, state)| (device.key().to_string(), state.as_str().into()))
            .collect();
        Self {
            record: RwLock::new(record),
            ..Self::new()
        }
    }

    /// Make subsequent writes fail with [`StoreError::Unavailable`]
    #[cfg(test)]
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Replace the whole record and notify subscribers, as a remote writer would
    #[cfg(test)]
    pub async fn publish(&self, record: StoreRecord) {
        let mut current = self.record.write().await;
        *current = record.clone();
        let _ = self.change_tx.send(record);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn get(&self) -> Result<StoreRecord, StoreError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(self.record.read().await.clone())
    }

    async fn set(&self, device: Device, value: &str) -> Result<(), StoreError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        if device.parse_state(value).is_none() {
            return Err(StoreError::Rejected {
                device,
                reason: format!("{:?} is not a valid state", value),
            });
        }

        let snapshot = {
            let mut record = self.record.write().await;
            record.insert(device.key().to_string(), value.into());
            record.clone()
        };

        debug!(%device, value, "store updated");
        // No subscribers is fine
        let _ = self.change_tx.send(snapshot);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreRecord> {
        self.change_tx.subscribe()
    }
}
