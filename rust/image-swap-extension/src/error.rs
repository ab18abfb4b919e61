use image_swap::ImageSwapError;
use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// An error raised by the replacement engine or its settings layer
    #[error(transparent)]
    Engine(#[from] ImageSwapError),

    /// A browser API was missing or threw
    #[error("Browser API error: {0}")]
    Browser(String),

    /// A message or stored value could not be encoded or decoded
    #[error("Failed to encode or decode a message: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for ExtensionError {
    fn from(value: serde_json::Error) -> Self {
        ExtensionError::Codec(format!("{value}"))
    }
}

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
impl From<wasm_bindgen::JsValue> for ExtensionError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        ExtensionError::Browser(format!("{value:?}"))
    }
}

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
impl From<ExtensionError> for wasm_bindgen::JsValue {
    fn from(value: ExtensionError) -> Self {
        js_sys::Error::new(&value.to_string()).into()
    }
}

impl From<ExtensionError> for ImageSwapError {
    fn from(value: ExtensionError) -> Self {
        match value {
            ExtensionError::Engine(error) => error,
            other => ImageSwapError::SettingsStore(other.to_string()),
        }
    }
}
