//! Commands from the popup and options page.
//!
//! Messages arrive through `chrome.runtime.onMessage` as JSON objects tagged
//! by `action`. Recognised commands are answered with `{success: true}`
//! before they run and are then queued for the event loop; anything else is
//! left for other listeners.

use image_swap::{Command, CommandResponse};

use crate::{EventSender, PageEvent};

/// Decode `message` and queue it. Returns the reply to send, or `None` if
/// the message is not a command.
pub fn route_message<Node>(message: &str, events: &EventSender<Node>) -> Option<CommandResponse> {
    let command: Command = match serde_json::from_str(message) {
        Ok(command) => command,
        Err(error) => {
            tracing::debug!(%error, "Ignoring message");
            return None;
        }
    };

    tracing::debug!(?command, "Received command");
    if events.send(PageEvent::Command(command)).is_err() {
        tracing::warn!("Event loop is gone; dropping command");
    }
    Some(CommandResponse::acknowledge())
}

/// Register the `chrome.runtime.onMessage` listener.
#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub fn listen_for_commands(events: EventSender<web_sys::Element>) -> Result<(), crate::ExtensionError> {
    use js_sys::Reflect;
    use wasm_bindgen::prelude::*;

    let callback = Closure::wrap(Box::new(
        move |message: JsValue, _sender: JsValue, send_response: js_sys::Function| -> JsValue {
            let Some(message) = js_sys::JSON::stringify(&message)
                .ok()
                .and_then(|message| message.as_string())
            else {
                return JsValue::FALSE;
            };

            if let Some(response) = route_message(&message, &events) {
                let reply = js_sys::Object::new();
                let _ = Reflect::set(&reply, &"success".into(), &response.success.into());
                let _ = send_response.call1(&JsValue::UNDEFINED, &reply);
            }

            // The reply, if any, has been sent synchronously
            JsValue::FALSE
        },
    )
        as Box<dyn FnMut(JsValue, JsValue, js_sys::Function) -> JsValue>);

    let on_message = crate::chrome(&["runtime", "onMessage"])?;
    let add_listener: js_sys::Function = Reflect::get(&on_message, &"addListener".into())?.dyn_into()?;
    add_listener.call1(&on_message, callback.as_ref())?;

    // The listener lives as long as the page
    callback.forget();
    Ok(())
}
