use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{RwLock, broadcast};

use crate::{ImageSwapError, SettingsKey};

use super::{SettingsStore, StorageChange, StorageChanges};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// A trivial implementation of [SettingsStore] where all values are kept in
/// memory and never persisted. Clones share the same values and the same
/// change feed.
#[derive(Clone)]
pub struct MemorySettingsStore {
    values: Arc<RwLock<Map<String, Value>>>,
    changes: broadcast::Sender<StorageChanges>,
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::with_values(Map::new())
    }
}

impl MemorySettingsStore {
    /// A store pre-populated with raw values, as if written by an earlier
    /// version of the extension.
    pub fn with_values(values: Map<String, Value>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Arc::new(RwLock::new(values)),
            changes,
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, keys: &[SettingsKey]) -> Result<Map<String, Value>, ImageSwapError> {
        let values = self.values.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| {
                values
                    .get(key.as_str())
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect())
    }

    async fn set(&mut self, values: Map<String, Value>) -> Result<(), ImageSwapError> {
        let mut changes = StorageChanges::new();
        {
            let mut stored = self.values.write().await;
            for (key, value) in values {
                let old_value = stored.insert(key.clone(), value.clone());
                if old_value.as_ref() != Some(&value) {
                    changes.insert(
                        key,
                        StorageChange {
                            old_value,
                            new_value: Some(value),
                        },
                    );
                }
            }
        }

        if !changes.is_empty() {
            // Nobody listening is not an error
            let _ = self.changes.send(changes);
        }

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChanges> {
        self.changes.subscribe()
    }
}
