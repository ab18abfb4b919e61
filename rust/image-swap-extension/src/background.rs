//! Background worker duties: seeding storage on install and reporting the
//! global switch.

use image_swap::{
    SettingsKey, SettingsStore, StorageChanges, install_defaults, migrate_url_patterns,
};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::ExtensionError;

/// Run on `chrome.runtime.onInstalled`: write the defaults and bring legacy
/// URL patterns up to date.
pub async fn on_installed<S: SettingsStore>(store: &mut S) -> Result<(), ExtensionError> {
    install_defaults(store).await?;
    migrate_url_patterns(store).await?;
    Ok(())
}

/// The new value of the global switch, if `changes` touched it.
pub fn switch_change(changes: &StorageChanges) -> Option<bool> {
    changes
        .get(SettingsKey::Enabled.as_str())
        .map(|change| !matches!(change.new_value, Some(Value::Bool(false))))
}

/// Log every flip of the global switch until the store goes away.
pub async fn report_switch(mut changes: broadcast::Receiver<StorageChanges>) {
    loop {
        match changes.recv().await {
            Ok(changes) => {
                if let Some(enabled) = switch_change(&changes) {
                    tracing::info!(enabled, "Extension switched");
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "Missed storage changes");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use image_swap::{MemorySettingsStore, load_settings};
    use serde_json::json;

    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    use wasm_bindgen_test::wasm_bindgen_test;

    use super::*;

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_seeds_and_migrates_on_install() -> Result<()> {
        let mut store = MemorySettingsStore::with_values(
            json!({ "enabled": false, "urlPatterns": ["https://*.example.com/*"] })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        );
        let mut changes = store.subscribe();

        on_installed(&mut store).await?;

        assert_eq!(switch_change(&changes.recv().await?), Some(true));
        let stored = store.get(&[SettingsKey::UrlPatterns]).await?;
        assert_eq!(
            stored.get("urlPatterns"),
            Some(&json!([{ "pattern": "https://*.example.com/*", "mode": "default", "enabled": true }]))
        );
        assert!(load_settings(&store).await?.enabled);
        Ok(())
    }

    #[test]
    fn it_ignores_changes_to_other_keys() -> Result<()> {
        let changes: StorageChanges = serde_json::from_value(json!({
            "customCss": { "oldValue": "a", "newValue": "b" }
        }))?;
        assert_eq!(switch_change(&changes), None);
        Ok(())
    }
}
