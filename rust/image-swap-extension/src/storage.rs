use async_trait::async_trait;
use image_swap::{ImageSwapError, SettingsKey, SettingsStore, StorageChanges};
use js_sys::{Function, JSON, Promise, Reflect};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::{ExtensionError, chrome};

const CHANGE_CAPACITY: usize = 16;

/// A [SettingsStore] backed by `chrome.storage.sync`.
#[derive(Clone)]
pub struct ChromeSyncStore {
    area: JsValue,
    changes: broadcast::Sender<StorageChanges>,
}

impl ChromeSyncStore {
    /// Connect to `chrome.storage.sync` and start relaying its change
    /// notifications.
    pub fn connect() -> Result<Self, ExtensionError> {
        let area = chrome(&["storage", "sync"])?;
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);

        let relay = changes.clone();
        let callback = Closure::wrap(Box::new(move |changes: JsValue, namespace: JsValue| {
            if namespace.as_string().as_deref() != Some("sync") {
                return;
            }
            match from_js::<StorageChanges>(&changes) {
                Ok(changes) => {
                    // Nobody listening is fine
                    let _ = relay.send(changes);
                }
                Err(error) => tracing::warn!(%error, "Unreadable storage change"),
            }
        }) as Box<dyn FnMut(JsValue, JsValue)>);

        let on_changed = chrome(&["storage", "onChanged"])?;
        let add_listener: Function = Reflect::get(&on_changed, &"addListener".into())?.dyn_into()?;
        add_listener.call1(&on_changed, callback.as_ref())?;
        callback.forget();

        Ok(Self { area, changes })
    }

    async fn call(&self, method: &str, argument: &JsValue) -> Result<JsValue, ExtensionError> {
        let function: Function = Reflect::get(&self.area, &method.into())?.dyn_into()?;
        let promise: Promise = function.call1(&self.area, argument)?.dyn_into()?;
        Ok(JsFuture::from(promise).await?)
    }
}

fn from_js<T: serde::de::DeserializeOwned>(value: &JsValue) -> Result<T, ExtensionError> {
    let json = JSON::stringify(value)?
        .as_string()
        .ok_or_else(|| ExtensionError::Codec("Value is not serializable".into()))?;
    Ok(serde_json::from_str(&json)?)
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, ExtensionError> {
    Ok(JSON::parse(&serde_json::to_string(value)?)?)
}

#[async_trait(?Send)]
impl SettingsStore for ChromeSyncStore {
    async fn get(&self, keys: &[SettingsKey]) -> Result<Map<String, Value>, ImageSwapError> {
        let keys: Vec<&str> = keys.iter().map(SettingsKey::as_str).collect();
        let values = self.call("get", &to_js(&keys)?).await?;
        Ok(from_js(&values)?)
    }

    async fn set(&mut self, values: Map<String, Value>) -> Result<(), ImageSwapError> {
        self.call("set", &to_js(&values)?).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChanges> {
        self.changes.subscribe()
    }
}
