//! [Document] over the live browser DOM.

use image_swap::constants::OBSERVED_ATTRIBUTES;
use image_swap::{Document, ElementKind, LoadState, Mutation, PageSignal, SelectorError};
use js_sys::Reflect;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, DocumentReadyState, Element, HtmlElement, HtmlImageElement,
    MutationObserver, MutationObserverInit, MutationRecord, NodeList,
};

use crate::{EventSender, ExtensionError, PageEvent};

/// Expando property holding an element's processing epoch.
const EPOCH_PROPERTY: &str = "__imageSwapEpoch";

/// Expando property set while a load error listener waits on an element.
const ERROR_WATCH_PROPERTY: &str = "__imageSwapErrorWatch";

type ObserverCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

struct Observer {
    observer: MutationObserver,
    // Keeps the JS callback alive for as long as the observer
    _callback: ObserverCallback,
}

impl Observer {
    fn new(events: EventSender<Element>) -> Result<Self, ExtensionError> {
        let callback: ObserverCallback = Closure::new(move |records: js_sys::Array, _| {
            let mutations: Vec<_> = records
                .iter()
                .filter_map(|record| record.dyn_into::<MutationRecord>().ok())
                .filter_map(convert_record)
                .collect();
            if !mutations.is_empty() {
                let _ = events.send(PageEvent::Page(PageSignal::Mutations(mutations)));
            }
        });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;

        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

fn convert_record(record: MutationRecord) -> Option<Mutation<Element>> {
    match record.type_().as_str() {
        "childList" => {
            let added = elements(record.added_nodes());
            (!added.is_empty()).then_some(Mutation::ChildList { added })
        }
        "attributes" => Some(Mutation::Attribute {
            target: record.target()?.dyn_into::<Element>().ok()?,
            name: record.attribute_name()?,
        }),
        _ => None,
    }
}

fn elements(list: NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|index| list.item(index))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

/// The page the content script was injected into.
pub struct WebDocument {
    window: web_sys::Window,
    document: web_sys::Document,
    events: EventSender<Element>,
    body_observer: Option<Observer>,
    root_observer: Option<Observer>,
}

impl WebDocument {
    /// Wrap the current window's document. Browser callbacks report to
    /// `events`.
    pub fn new(events: EventSender<Element>) -> Result<Self, ExtensionError> {
        let window = web_sys::window().ok_or_else(|| ExtensionError::Browser("No window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| ExtensionError::Browser("No document".into()))?;

        Ok(Self {
            window,
            document,
            events,
            body_observer: None,
            root_observer: None,
        })
    }

    /// The URL of the page.
    pub fn url(&self) -> Result<String, ExtensionError> {
        Ok(self.window.location().href()?)
    }

    /// Report [PageSignal::DomReady] once parsing completes.
    pub fn notify_when_ready(&self) -> Result<(), ExtensionError> {
        let events = self.events.clone();
        let callback = Closure::once_into_js(move || {
            let _ = events.send(PageEvent::Page(PageSignal::DomReady));
        });
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        self.document
            .add_event_listener_with_callback_and_add_event_listener_options(
                "DOMContentLoaded",
                callback.unchecked_ref(),
                &options,
            )?;
        Ok(())
    }

    fn observe(&self, target: &web_sys::Node, options: &MutationObserverInit) -> Option<Observer> {
        let observer = match Observer::new(self.events.clone()) {
            Ok(observer) => observer,
            Err(error) => {
                tracing::warn!(%error, "Could not create a mutation observer");
                return None;
            }
        };
        if let Err(error) = observer.observer.observe_with_options(target, options) {
            tracing::warn!(?error, "Could not start observing");
            return None;
        }
        Some(observer)
    }

    fn style_of(node: &Element) -> Option<web_sys::CssStyleDeclaration> {
        node.dyn_ref::<HtmlElement>().map(HtmlElement::style)
    }
}

impl Document for WebDocument {
    type Node = Element;

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn is_loading(&self) -> bool {
        self.document.ready_state() == DocumentReadyState::Loading
    }

    fn is_connected(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn kind(&self, node: &Element) -> ElementKind {
        match node.local_name().as_str() {
            "img" => ElementKind::Image,
            "source" => ElementKind::Source,
            "picture" => ElementKind::Picture,
            _ => ElementKind::Other,
        }
    }

    fn closest_picture(&self, node: &Element) -> Option<Element> {
        node.closest("picture").ok().flatten()
    }

    fn first_image(&self, node: &Element) -> Option<Element> {
        node.query_selector("img").ok().flatten()
    }

    fn images(&self, within: Option<&Element>) -> Vec<Element> {
        let found = match within {
            Some(element) => element.query_selector_all("img"),
            None => self.document.query_selector_all("img"),
        };
        found.map(elements).unwrap_or_default()
    }

    fn picture_sources(&self, within: Option<&Element>) -> Vec<Element> {
        let found = match within {
            Some(element) => element.query_selector_all("picture > source"),
            None => self.document.query_selector_all("picture > source"),
        };
        found.map(elements).unwrap_or_default()
    }

    fn matches_selector(&self, node: &Element, selector: &str) -> Result<bool, SelectorError> {
        node.matches(selector)
            .map_err(|_| SelectorError::Rejected(selector.to_owned()))
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Element, name: &str, value: &str) {
        if let Err(error) = node.set_attribute(name, value) {
            tracing::warn!(?error, name, "Could not set attribute");
        }
    }

    fn add_class(&mut self, node: &Element, class: &str) {
        if let Err(error) = node.class_list().add_1(class) {
            tracing::warn!(?error, class, "Could not add class");
        }
    }

    fn style(&self, node: &Element, property: &str) -> String {
        Self::style_of(node)
            .and_then(|style| style.get_property_value(property).ok())
            .unwrap_or_default()
    }

    fn clear_style(&mut self, node: &Element, property: &str) {
        if let Some(style) = Self::style_of(node) {
            let _ = style.remove_property(property);
        }
    }

    fn computed_style(&self, node: &Element, property: &str) -> Option<String> {
        self.window
            .get_computed_style(node)
            .ok()
            .flatten()
            .and_then(|style| style.get_property_value(property).ok())
    }

    fn load_state(&self, node: &Element) -> LoadState {
        match node.dyn_ref::<HtmlImageElement>() {
            Some(image) if image.complete() && image.natural_width() == 0 => LoadState::Failed,
            Some(image) if image.complete() => LoadState::Loaded,
            _ => LoadState::Loading,
        }
    }

    fn processed_epoch(&self, node: &Element) -> Option<u64> {
        Reflect::get(node, &EPOCH_PROPERTY.into())
            .ok()
            .and_then(|epoch| epoch.as_f64())
            .map(|epoch| epoch as u64)
    }

    fn set_processed_epoch(&mut self, node: &Element, epoch: Option<u64>) {
        let key = JsValue::from_str(EPOCH_PROPERTY);
        let result = match epoch {
            Some(epoch) => Reflect::set(node, &key, &JsValue::from_f64(epoch as f64)),
            None => Reflect::delete_property(node, &key),
        };
        if result.is_err() {
            tracing::warn!("Could not tag element with its processing epoch");
        }
    }

    fn watch_load_error(&mut self, node: &Element) {
        let events = self.events.clone();
        let failed = node.clone();
        let callback = Closure::once_into_js(move || {
            let _ = Reflect::delete_property(&failed, &ERROR_WATCH_PROPERTY.into());
            let _ = events.send(PageEvent::Page(PageSignal::LoadError(failed)));
        });
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        if let Err(error) = node.add_event_listener_with_callback_and_add_event_listener_options(
            "error",
            callback.unchecked_ref(),
            &options,
        ) {
            tracing::warn!(?error, "Could not watch for load errors");
            return;
        }
        if Reflect::set(node, &ERROR_WATCH_PROPERTY.into(), &JsValue::TRUE).is_err() {
            tracing::warn!("Could not tag element with its load error listener");
        }
    }

    fn is_watching_load_error(&self, node: &Element) -> bool {
        Reflect::get(node, &ERROR_WATCH_PROPERTY.into())
            .ok()
            .and_then(|watching| watching.as_bool())
            .unwrap_or(false)
    }

    fn install_style(&mut self, id: &str, css: &str) {
        if let Some(existing) = self.document.get_element_by_id(id) {
            existing.remove();
        }

        let style = match self.document.create_element("style") {
            Ok(style) => style,
            Err(error) => {
                tracing::warn!(?error, "Could not create style element");
                return;
            }
        };
        style.set_id(id);
        style.set_text_content(Some(css));

        let parent: Option<web_sys::Node> = match self.document.head() {
            Some(head) => Some(head.into()),
            None => self.document.document_element().map(Into::into),
        };
        if let Some(parent) = parent {
            if let Err(error) = parent.append_child(&style) {
                tracing::warn!(?error, "Could not install style element");
            }
        }
    }

    fn observe_body(&mut self, body: &Element) {
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        options.set_attributes(true);
        let filter: js_sys::Array = OBSERVED_ATTRIBUTES.iter().map(|name| JsValue::from_str(name)).collect();
        options.set_attribute_filter(&filter);

        self.body_observer = self.observe(body, &options);
    }

    fn observe_root(&mut self) {
        let Some(root) = self.document.document_element() else {
            tracing::warn!("Document has no root element");
            return;
        };
        let options = MutationObserverInit::new();
        options.set_child_list(true);

        self.root_observer = self.observe(&root, &options);
    }

    fn disconnect_root(&mut self) {
        if let Some(root) = self.root_observer.take() {
            root.observer.disconnect();
        }
    }
}
