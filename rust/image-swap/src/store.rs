use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::{ImageSwapError, Settings, SettingsKey};

mod memory;
pub use memory::*;

/// The before and after of a single stored key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    /// Value before the write, absent if the key was unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// Value after the write, absent if the key was removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// A change notification: every key touched by one write.
pub type StorageChanges = BTreeMap<String, StorageChange>;

/// A [SettingsStore] is a facade over the key-value substrate that persists
/// the user configuration (`chrome.storage.sync` in a browser).
///
/// Reads return the latest committed values. Writes are fire-and-forget from
/// the caller's point of view; observers learn about them through
/// [SettingsStore::subscribe].
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait SettingsStore: Clone {
    /// Read the values stored against `keys`. Unset keys are absent from the
    /// returned map.
    async fn get(&self, keys: &[SettingsKey]) -> Result<Map<String, Value>, ImageSwapError>;

    /// Store each of the given values against its key.
    async fn set(&mut self, values: Map<String, Value>) -> Result<(), ImageSwapError>;

    /// Receive a notification for every subsequent write.
    fn subscribe(&self) -> broadcast::Receiver<StorageChanges>;
}

/// Read a full, normalized [Settings] snapshot from `store`.
pub async fn load_settings<S: SettingsStore>(store: &S) -> Result<Settings, ImageSwapError> {
    let values = store.get(&SettingsKey::ALL).await?;
    Ok(Settings::from_stored(&values))
}

/// Persist every key of `settings` to `store`.
pub async fn save_settings<S: SettingsStore>(
    store: &mut S,
    settings: &Settings,
) -> Result<(), ImageSwapError> {
    store.set(settings.to_stored()).await
}

/// Seed a freshly installed store. Only the global switch is written; every
/// other key falls back to its default on read.
pub async fn install_defaults<S: SettingsStore>(store: &mut S) -> Result<(), ImageSwapError> {
    let mut values = Map::new();
    values.insert(SettingsKey::Enabled.to_string(), Value::Bool(true));
    store.set(values).await
}

/// Rewrite legacy flat-string URL patterns as objects.
///
/// Returns `true` if anything was rewritten. Stores without legacy entries
/// are left untouched.
pub async fn migrate_url_patterns<S: SettingsStore>(
    store: &mut S,
) -> Result<bool, ImageSwapError> {
    let values = store.get(&[SettingsKey::UrlPatterns]).await?;

    let needs_migration = matches!(
        values.get(SettingsKey::UrlPatterns.as_str()),
        Some(Value::Array(entries)) if entries.iter().any(Value::is_string)
    );

    if !needs_migration {
        return Ok(false);
    }

    let settings = Settings::from_stored(&values);
    let mut rewritten = Map::new();
    rewritten.insert(
        SettingsKey::UrlPatterns.to_string(),
        serde_json::to_value(&settings.url_patterns)?,
    );
    store.set(rewritten).await?;

    tracing::info!(
        count = settings.url_patterns.len(),
        "Migrated legacy URL patterns"
    );

    Ok(true)
}
