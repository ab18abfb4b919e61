use serde::{Deserialize, Serialize};

use crate::{ImageSwapError, Settings, SettingsKey, SettingsStore, load_settings};

/// A message sent to the content script by the popup or the options page.
///
/// On the wire this is a JSON object tagged by `action`, e.g.
/// `{"action": "toggleEnabled", "enabled": false}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// The global switch was flipped
    ToggleEnabled {
        /// The new value of the switch
        enabled: bool,
    },
    /// Stored settings changed; refresh the cached snapshot
    SettingsUpdated,
    /// Refresh settings and evaluate every element again
    ReprocessImages,
    /// Re-inject the custom stylesheet
    ReloadCss,
}

/// The reply to every [Command].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Always `true`: commands cannot fail from the sender's point of view
    pub success: bool,
}

impl CommandResponse {
    /// The acknowledgement sent for every command.
    pub fn acknowledge() -> Self {
        Self { success: true }
    }
}

/// A [Command] together with whatever it needed from the settings store.
///
/// Preparing is the only part of handling a command that awaits; applying
/// a prepared command to a page is synchronous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedCommand {
    /// See [Command::ToggleEnabled]
    ToggleEnabled {
        /// The new value of the switch
        enabled: bool,
    },
    /// See [Command::SettingsUpdated]
    SettingsUpdated(Settings),
    /// See [Command::ReprocessImages]
    ReprocessImages(Settings),
    /// See [Command::ReloadCss]
    ReloadCss {
        /// Stylesheet to inject
        css: String,
    },
}

impl Command {
    /// Read what the command needs from `store`.
    pub async fn prepare<S: SettingsStore>(
        self,
        store: &S,
    ) -> Result<PreparedCommand, ImageSwapError> {
        Ok(match self {
            Command::ToggleEnabled { enabled } => PreparedCommand::ToggleEnabled { enabled },
            Command::SettingsUpdated => PreparedCommand::SettingsUpdated(load_settings(store).await?),
            Command::ReprocessImages => PreparedCommand::ReprocessImages(load_settings(store).await?),
            Command::ReloadCss => {
                let values = store.get(&[SettingsKey::CustomCss]).await?;
                PreparedCommand::ReloadCss {
                    css: Settings::from_stored(&values).custom_css,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    use wasm_bindgen_test::wasm_bindgen_test;

    use super::*;
    use crate::MemorySettingsStore;
    use crate::constants::DEFAULT_CUSTOM_CSS;

    #[test]
    fn it_decodes_tagged_commands() -> Result<()> {
        let commands: Vec<Command> = serde_json::from_value(json!([
            { "action": "toggleEnabled", "enabled": false },
            { "action": "settingsUpdated" },
            { "action": "reprocessImages" },
            { "action": "reloadCss", "unused": 1 },
        ]))?;

        assert_eq!(
            commands,
            vec![
                Command::ToggleEnabled { enabled: false },
                Command::SettingsUpdated,
                Command::ReprocessImages,
                Command::ReloadCss,
            ]
        );
        assert!(serde_json::from_value::<Command>(json!({ "action": "selfDestruct" })).is_err());
        Ok(())
    }

    #[test]
    fn it_acknowledges_with_success() -> Result<()> {
        assert_eq!(
            serde_json::to_value(CommandResponse::acknowledge())?,
            json!({ "success": true })
        );
        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_prepares_commands_from_the_store() -> Result<()> {
        let store = MemorySettingsStore::default();

        assert_eq!(
            Command::ReloadCss.prepare(&store).await?,
            PreparedCommand::ReloadCss {
                css: DEFAULT_CUSTOM_CSS.to_owned()
            }
        );
        assert_eq!(
            Command::ReprocessImages.prepare(&store).await?,
            PreparedCommand::ReprocessImages(Settings::default())
        );
        Ok(())
    }
}
