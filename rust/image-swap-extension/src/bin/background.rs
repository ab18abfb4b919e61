//! Background service worker entry point.
//!
//! Seeds `chrome.storage.sync` when the extension is installed and logs
//! every flip of the global switch.

fn main() {
    // On other targets this is a no-op
    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    {
        console_error_panic_hook::set_once();
        image_swap_extension::logging::init_logging();

        if let Err(error) = setup_install_listener() {
            tracing::error!(%error, "Background worker failed to start");
        }
    }
}

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
fn setup_install_listener() -> Result<(), image_swap_extension::ExtensionError> {
    use image_swap::SettingsStore;
    use image_swap_extension::background::{on_installed, report_switch};
    use image_swap_extension::storage::ChromeSyncStore;
    use js_sys::Reflect;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;

    let store = ChromeSyncStore::connect()?;
    spawn_local(report_switch(store.subscribe()));

    let callback = Closure::wrap(Box::new(move |_details: JsValue| {
        let mut store = store.clone();
        spawn_local(async move {
            if let Err(error) = on_installed(&mut store).await {
                tracing::warn!(%error, "Could not seed settings");
            }
        });
    }) as Box<dyn FnMut(JsValue)>);

    let runtime = Reflect::get(&js_sys::global(), &"chrome".into())
        .and_then(|chrome| Reflect::get(&chrome, &"runtime".into()))?;
    let on_installed_event = Reflect::get(&runtime, &"onInstalled".into())?;
    let add_listener: js_sys::Function =
        Reflect::get(&on_installed_event, &"addListener".into())?.dyn_into()?;
    add_listener.call1(&on_installed_event, callback.as_ref())?;

    // Leak the closure so it lives as long as the worker
    callback.forget();
    Ok(())
}
