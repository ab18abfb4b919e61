//! Content script entry point.
//!
//! Compiled to WASM and injected into every page. It reads the settings,
//! swaps the page's images according to them and keeps doing so as the page
//! changes, until the page goes away.

fn main() {
    // On other targets this is a no-op
    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    {
        console_error_panic_hook::set_once();
        image_swap_extension::logging::init_logging();

        wasm_bindgen_futures::spawn_local(async {
            if let Err(error) = image_swap_extension::start_content_script().await {
                tracing::error!(%error, "Content script failed to start");
            }
        });
    }
}
