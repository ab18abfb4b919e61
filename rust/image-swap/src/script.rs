use std::sync::Arc;

use crate::constants::STYLE_ELEMENT_ID;
use crate::{
    CommandResponse, Disposition, Document, ImageSwapError, Mutation, ObserverBridge,
    PreparedCommand, ProcessingState, ReplacementMode, ReplacementPolicy, Settings, SettingsStore,
    SiteScope, load_settings,
};

/// Something that happened on the page and that the content script has to
/// react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSignal<Node> {
    /// `DOMContentLoaded` fired
    DomReady,
    /// The installed observer delivered a batch of records
    Mutations(Vec<Mutation<Node>>),
    /// A watched image failed to load
    LoadError(Node),
}

/// Counts of what one pass over some elements did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Elements that received a placeholder
    pub replaced: usize,
    /// Elements that will receive one if they fail to load
    pub pending: usize,
    /// Elements left as they are
    pub skipped: usize,
}

impl ScanSummary {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Replaced => self.replaced += 1,
            Disposition::PendingFailure => self.pending += 1,
            _ => self.skipped += 1,
        }
    }
}

/// The per-page content script: the owner of all engine state for one
/// document.
///
/// A host creates one per page load, calls [ContentScript::start] once, and
/// then feeds it [PageSignal]s and prepared commands in arrival order. Every
/// call completes synchronously.
#[derive(Debug)]
pub struct ContentScript<Node> {
    page_url: String,
    settings: Arc<Settings>,
    scope: SiteScope,
    policy: ReplacementPolicy,
    state: ProcessingState<Node>,
    bridge: ObserverBridge,
    awaiting_ready: bool,
}

impl<Node> ContentScript<Node>
where
    Node: Clone + PartialEq + std::fmt::Debug,
{
    /// A content script for the page at `page_url`, using `settings`.
    pub fn new(page_url: impl Into<String>, settings: Settings) -> Self {
        let page_url = page_url.into();
        let scope = SiteScope::new(&settings.url_patterns);
        let policy = Self::policy_for(&page_url, &scope, &settings);

        Self {
            page_url,
            settings: Arc::new(settings),
            scope,
            policy,
            state: ProcessingState::default(),
            bridge: ObserverBridge::default(),
            awaiting_ready: false,
        }
    }

    /// A content script for the page at `page_url`, using the settings
    /// currently in `store`.
    pub async fn load<S: SettingsStore>(
        page_url: impl Into<String>,
        store: &S,
    ) -> Result<Self, ImageSwapError> {
        Ok(Self::new(page_url, load_settings(store).await?))
    }

    fn policy_for(page_url: &str, scope: &SiteScope, settings: &Settings) -> ReplacementPolicy {
        let mode = scope.effective_mode(page_url, settings.replacement_mode);
        ReplacementPolicy::new(settings, mode)
    }

    /// The settings snapshot in use.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// The engine's bookkeeping.
    pub fn state(&self) -> &ProcessingState<Node> {
        &self.state
    }

    /// The observer bridge.
    pub fn bridge(&self) -> &ObserverBridge {
        &self.bridge
    }

    /// The replacement mode in force on this page.
    pub fn mode(&self) -> ReplacementMode {
        self.policy.mode()
    }

    /// Whether the URL patterns let the script act on this page.
    pub fn is_url_allowed(&self) -> bool {
        self.scope.is_url_allowed(&self.page_url)
    }

    /// Whether elements are being replaced right now.
    pub fn is_active(&self) -> bool {
        self.settings.enabled && self.is_url_allowed()
    }

    /// Inject the stylesheet, scan the page (or schedule the scan for when
    /// parsing finishes) and install the observer.
    ///
    /// Pages outside the configured patterns only get the stylesheet.
    pub fn start<D: Document<Node = Node>>(&mut self, dom: &mut D) -> ScanSummary {
        dom.install_style(STYLE_ELEMENT_ID, &self.settings.custom_css);

        if !self.is_url_allowed() {
            tracing::info!(url = %self.page_url, "Page is outside the configured patterns");
            return ScanSummary::default();
        }

        let summary = if dom.is_loading() {
            self.awaiting_ready = true;
            ScanSummary::default()
        } else {
            self.process_page(dom)
        };

        self.bridge.start(dom);
        summary
    }

    /// Evaluate every image and `picture > source` in the document.
    pub fn process_page<D: Document<Node = Node>>(&mut self, dom: &mut D) -> ScanSummary {
        let mut summary = ScanSummary::default();
        if !self.is_active() {
            return summary;
        }

        self.state.prune(dom);

        for image in dom.images(None) {
            summary.record(self.policy.process_image(dom, &mut self.state, &image));
        }
        for source in dom.picture_sources(None) {
            summary.record(self.policy.process_source(dom, &mut self.state, &source));
        }

        tracing::info!(
            replaced = summary.replaced,
            pending = summary.pending,
            skipped = summary.skipped,
            mode = ?self.policy.mode(),
            "Processed page"
        );
        summary
    }

    /// React to a page event.
    pub fn handle<D: Document<Node = Node>>(
        &mut self,
        dom: &mut D,
        signal: PageSignal<Node>,
    ) -> ScanSummary {
        match signal {
            PageSignal::DomReady => {
                if std::mem::take(&mut self.awaiting_ready) {
                    self.process_page(dom)
                } else {
                    ScanSummary::default()
                }
            }
            PageSignal::Mutations(mutations) => {
                let routes = self.bridge.collect(dom, mutations);
                self.state.prune(dom);
                let mut summary = ScanSummary::default();
                if !self.is_active() {
                    return summary;
                }

                for route in routes {
                    if route.reset {
                        self.state.forget(dom, &route.node);
                    }
                    if let Some(disposition) = self.policy.process(dom, &mut self.state, &route.node) {
                        summary.record(disposition);
                    }
                }
                summary
            }
            PageSignal::LoadError(node) => ScanSummary {
                replaced: self.state.handle_load_error(dom, &node),
                ..Default::default()
            },
        }
    }

    /// Apply a command from the popup or options page.
    pub fn apply<D: Document<Node = Node>>(
        &mut self,
        dom: &mut D,
        command: PreparedCommand,
    ) -> CommandResponse {
        match command {
            PreparedCommand::ToggleEnabled { enabled } => {
                tracing::info!(enabled, "Toggled");
                Arc::make_mut(&mut self.settings).enabled = enabled;
                if enabled {
                    self.process_page(dom);
                }
            }
            PreparedCommand::SettingsUpdated(settings) => {
                tracing::info!("Settings updated");
                self.reconfigure(settings);
                if self.is_url_allowed() {
                    self.bridge.start(dom);
                }
            }
            PreparedCommand::ReprocessImages(settings) => {
                tracing::info!("Reprocessing images");
                self.reconfigure(settings);
                self.state.reset();
                if self.is_url_allowed() {
                    self.bridge.start(dom);
                }
                self.process_page(dom);
            }
            PreparedCommand::ReloadCss { css } => {
                tracing::info!("Reloading stylesheet");
                dom.install_style(STYLE_ELEMENT_ID, &css);
            }
        }

        CommandResponse::acknowledge()
    }

    fn reconfigure(&mut self, settings: Settings) {
        self.scope = SiteScope::new(&settings.url_patterns);
        self.policy = Self::policy_for(&self.page_url, &self.scope, &settings);
        self.settings = Arc::new(settings);
    }
}
