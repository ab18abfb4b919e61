#![warn(missing_docs)]

//! Browser extension that runs the [`image_swap`] engine on every page.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐  chrome.tabs.sendMessage  ┌─────────────────────────────┐
//! │ Popup / options page │ ────────────────────────▸ │ Content script (host page)  │
//! └──────────────────────┘                           │                             │
//!            │                                       │  onMessage ──┐              │
//!            ▼                                       │  observers ──┼─▸ channel    │
//!   chrome.storage.sync ◂─────── ChromeSyncStore ────│  listeners ──┘      │       │
//!            ▲                                       │                     ▼       │
//!            │                                       │      Runtime ─▸ ContentScript│
//! ┌──────────────────────┐                           │         │                   │
//! │ Background worker    │                           │         ▼                   │
//! │  (install defaults)  │                           │     WebDocument ─▸ DOM      │
//! └──────────────────────┘                           └─────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - **[`runtime`]**: the single event loop that owns the engine state.
//! - **[`messaging`]**: decodes commands and replies `{success: true}`.
//! - **[`background`]**: install-time seeding of the settings store.
//! - **[`logging`]**: `tracing` output to the devtools console.
//! - **`dom`** and **`storage`** (wasm only): [`image_swap::Document`] and
//!   [`image_swap::SettingsStore`] over the browser APIs.
//!
//! # Entry points
//!
//! - **`content`** binary: injected into every page; calls
//!   `start_content_script`.
//! - **`background`** binary: the service worker; seeds storage on install.

mod error;
pub use error::*;

pub mod background;
pub mod logging;
pub mod messaging;

pub mod runtime;
pub use runtime::*;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub mod dom;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub mod storage;

/// Look up `chrome.<path>` on the global object.
#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub(crate) fn chrome(path: &[&str]) -> Result<wasm_bindgen::JsValue, ExtensionError> {
    let mut value = js_sys::Reflect::get(&js_sys::global(), &"chrome".into())?;
    for segment in path {
        if value.is_undefined() || value.is_null() {
            break;
        }
        value = js_sys::Reflect::get(&value, &(*segment).into())?;
    }
    if value.is_undefined() || value.is_null() {
        return Err(ExtensionError::Browser(format!(
            "chrome.{} is not available",
            path.join(".")
        )));
    }
    Ok(value)
}

/// Wire the content script into the current page and run it for the
/// lifetime of the page.
#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub async fn start_content_script() -> Result<(), ExtensionError> {
    use image_swap::Document;

    let (events, receiver) = event_channel();
    let document = dom::WebDocument::new(events.clone())?;
    let store = storage::ChromeSyncStore::connect()?;
    let page_url = document.url()?;

    messaging::listen_for_commands(events.clone())?;
    if document.is_loading() {
        document.notify_when_ready()?;
    }

    let runtime = Runtime::start(document, store, page_url).await?;
    tracing::debug!(mode = ?runtime.script().mode(), "Content script started");

    // Browser callbacks hold their own senders
    drop(events);
    runtime.run(receiver).await;
    Ok(())
}
