//! The content script's event loop.
//!
//! Browser callbacks (mutation observers, load error listeners,
//! `DOMContentLoaded`, `chrome.runtime.onMessage`) never touch engine state
//! themselves. They push a [PageEvent] into one unbounded channel, and a
//! single task owns the [ContentScript] and applies events strictly in
//! arrival order.

use image_swap::{Command, ContentScript, Document, PageSignal, SettingsStore};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::ExtensionError;

/// Everything the event loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent<Node> {
    /// Something happened on the page
    Page(PageSignal<Node>),
    /// The popup or options page sent a command
    Command(Command),
}

/// Sending half of the event channel, handed to every browser callback.
pub type EventSender<Node> = UnboundedSender<PageEvent<Node>>;

/// Receiving half of the event channel, owned by the [Runtime].
pub type EventReceiver<Node> = UnboundedReceiver<PageEvent<Node>>;

/// A fresh event channel.
pub fn event_channel<Node>() -> (EventSender<Node>, EventReceiver<Node>) {
    unbounded_channel()
}

/// Owner of one page's document handle, settings store and content script.
pub struct Runtime<D: Document, S: SettingsStore> {
    document: D,
    store: S,
    script: ContentScript<D::Node>,
}

impl<D, S> Runtime<D, S>
where
    D: Document,
    S: SettingsStore,
{
    /// Load settings from `store` and start the content script on
    /// `document`.
    pub async fn start(
        mut document: D,
        store: S,
        page_url: impl Into<String>,
    ) -> Result<Self, ExtensionError> {
        let mut script = ContentScript::load(page_url, &store).await?;
        script.start(&mut document);
        Ok(Self {
            document,
            store,
            script,
        })
    }

    /// The document handle.
    pub fn document(&self) -> &D {
        &self.document
    }

    /// Mutable access to the document handle.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    /// The content script.
    pub fn script(&self) -> &ContentScript<D::Node> {
        &self.script
    }

    /// Apply one event.
    pub async fn dispatch(&mut self, event: PageEvent<D::Node>) {
        match event {
            PageEvent::Page(signal) => {
                self.script.handle(&mut self.document, signal);
            }
            PageEvent::Command(command) => match command.clone().prepare(&self.store).await {
                Ok(prepared) => {
                    self.script.apply(&mut self.document, prepared);
                }
                Err(error) => {
                    tracing::warn!(?command, %error, "Could not read settings for command");
                }
            },
        }
    }

    /// Apply events until every sender is gone, then hand the runtime back.
    pub async fn run(mut self, mut events: EventReceiver<D::Node>) -> Self {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        tracing::debug!("Event channel closed");
        self
    }
}
