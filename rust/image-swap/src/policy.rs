//! The per-element replacement decision.
//!
//! Every `<img>` and `picture > source` the content script sees is run
//! through a [ReplacementPolicy]. The policy walks a fixed ladder:
//!
//! 1. already marked in this pass: nothing to do
//! 2. whitelisted: mark, leave alone
//! 3. already showing a placeholder: mark, leave alone
//! 4. otherwise build the placeholder URL and, depending on the
//!    [ReplacementMode], swap it in now or once the element fails to load
//!
//! Load error reactions are recorded as [FailureAction]s in the
//! [ProcessingState] rather than as host callbacks. The host only delivers
//! "this element failed to load" and the state decides what that means.

use rand::Rng;

use crate::constants::{MARKER_CLASS, RANDOM_SEED_BOUND, SRC_ATTRIBUTE, SRCSET_ATTRIBUTE};
use crate::{
    Dimensions, Document, ElementKind, ElementTarget, LoadState, PictureIdentity, ProcessedMarks,
    ReplacementMode, ReplacementTarget, Settings, Whitelist, compute_dimensions, compute_seed,
    is_placeholder_url,
};

/// What the policy did with an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The element was already handled in this pass
    AlreadyProcessed,
    /// A whitelist selector matched
    Whitelisted,
    /// The element already shows a placeholder
    AlreadyTarget,
    /// The placeholder was swapped in
    Replaced,
    /// The placeholder will be swapped in if the element fails to load
    PendingFailure,
    /// The element loads fine and is kept as is
    LeftIntact,
}

/// What to do when a watched image fails to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureAction<Node> {
    /// Swap the placeholder into the failed image
    ReplaceImage {
        /// Placeholder computed when the watch was registered
        url: String,
    },
    /// Swap a placeholder into a `<source>` whose sibling image failed
    ReplaceSource {
        /// The `<source>` element to rewrite
        source: Node,
    },
}

impl<Node: PartialEq> FailureAction<Node> {
    fn same_watch(&self, other: &Self) -> bool {
        match (self, other) {
            (FailureAction::ReplaceImage { .. }, FailureAction::ReplaceImage { .. }) => true,
            (
                FailureAction::ReplaceSource { source },
                FailureAction::ReplaceSource { source: other },
            ) => source == other,
            _ => false,
        }
    }
}

/// Mutable bookkeeping of one content script: which elements are marked
/// and which load errors are awaited.
///
/// Whether a load error listener is installed on an element is the host's
/// to know ([Document::is_watching_load_error]); the state only holds the
/// deferred replacements of failed mode, and drops those as soon as their
/// image loads or leaves the document.
#[derive(Debug, Clone)]
pub struct ProcessingState<Node> {
    marks: ProcessedMarks,
    pending: Vec<(Node, FailureAction<Node>)>,
}

impl<Node> Default for ProcessingState<Node> {
    fn default() -> Self {
        Self {
            marks: ProcessedMarks::new(),
            pending: Vec::new(),
        }
    }
}

impl<Node: Clone + PartialEq + std::fmt::Debug> ProcessingState<Node> {
    /// The processed marks of the current pass.
    pub fn marks(&self) -> &ProcessedMarks {
        &self.marks
    }

    /// Number of failure actions awaiting a load error of `node`.
    pub fn pending_for(&self, node: &Node) -> usize {
        self.pending
            .iter()
            .filter(|(watched, _)| watched == node)
            .count()
    }

    /// Number of failure actions awaiting any load error.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Start a new pass: every mark and every pending action is dropped.
    /// Host listeners already installed stay registered.
    pub fn reset(&mut self) {
        self.marks.clear();
        self.pending.clear();
    }

    /// Forget the engine's own decision about `node` so it can be evaluated
    /// again. Actions that other elements registered on `node` are kept.
    pub fn forget<D: Document<Node = Node>>(&mut self, dom: &mut D, node: &Node) {
        self.marks.unmark(dom, node);
        self.pending.retain(|(watched, action)| {
            watched != node || matches!(action, FailureAction::ReplaceSource { .. })
        });
    }

    /// Drop pending actions that can no longer fire usefully: the image has
    /// loaded, or it or the `<source>` to rewrite has left the document.
    pub fn prune<D: Document<Node = Node>>(&mut self, dom: &D) {
        self.pending.retain(|(watched, action)| {
            dom.load_state(watched) != LoadState::Loaded
                && dom.is_connected(watched)
                && match action {
                    FailureAction::ReplaceSource { source } => dom.is_connected(source),
                    FailureAction::ReplaceImage { .. } => true,
                }
        });
    }

    /// React to a load error of `node`. A failing placeholder is given up
    /// on; otherwise every action registered on it runs once and later
    /// errors of the same element find nothing to do. Returns the number of
    /// elements that received a placeholder.
    pub fn handle_load_error<D: Document<Node = Node>>(&mut self, dom: &mut D, node: &Node) -> usize {
        if dom
            .attribute(node, SRC_ATTRIBUTE)
            .is_some_and(|src| is_placeholder_url(&src))
        {
            tracing::debug!(?node, "Placeholder failed to load, giving up");
            self.marks.mark(dom, node);
        }

        let (actions, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(watched, _)| watched == node);
        self.pending = rest;

        let mut replaced = 0;
        for (_, action) in actions {
            match action {
                FailureAction::ReplaceImage { url } => {
                    if !self.marks.is_marked(dom, node) {
                        apply_image(dom, &self.marks, node, &url);
                        replaced += 1;
                    }
                }
                FailureAction::ReplaceSource { source } => {
                    if !self.marks.is_marked(dom, &source) {
                        replace_source(dom, &self.marks, &source, Some(node));
                        replaced += 1;
                    }
                }
            }
        }
        replaced
    }

    fn defer<D: Document<Node = Node>>(&mut self, dom: &mut D, node: &Node, action: FailureAction<Node>) {
        if !self
            .pending
            .iter()
            .any(|(watched, existing)| watched == node && existing.same_watch(&action))
        {
            self.pending.push((node.clone(), action));
        }
        listen(dom, node);
    }
}

/// Install a load error listener on `node` unless one is still waiting.
fn listen<D: Document>(dom: &mut D, node: &D::Node) {
    if !dom.is_watching_load_error(node) {
        dom.watch_load_error(node);
    }
}

/// The replacement rules in force for one settings snapshot and page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementPolicy {
    whitelist: Whitelist,
    mode: ReplacementMode,
}

impl ReplacementPolicy {
    /// Rules from `settings`, triggering in `mode` (the effective mode for
    /// the page, which URL patterns may override).
    pub fn new(settings: &Settings, mode: ReplacementMode) -> Self {
        Self {
            whitelist: Whitelist::new(settings.whitelist.clone()),
            mode,
        }
    }

    /// The trigger mode.
    pub fn mode(&self) -> ReplacementMode {
        self.mode
    }

    /// Route `node` by its kind. Elements other than images and sources are
    /// ignored.
    pub fn process<D: Document>(
        &self,
        dom: &mut D,
        state: &mut ProcessingState<D::Node>,
        node: &D::Node,
    ) -> Option<Disposition> {
        match dom.kind(node) {
            ElementKind::Image => Some(self.process_image(dom, state, node)),
            ElementKind::Source => Some(self.process_source(dom, state, node)),
            _ => None,
        }
    }

    /// Decide about one `<img>`.
    pub fn process_image<D: Document>(
        &self,
        dom: &mut D,
        state: &mut ProcessingState<D::Node>,
        image: &D::Node,
    ) -> Disposition {
        let disposition = self.evaluate_image(dom, state, image);
        tracing::debug!(?image, ?disposition, "Processed image");
        disposition
    }

    /// Decide about one `<source>`.
    pub fn process_source<D: Document>(
        &self,
        dom: &mut D,
        state: &mut ProcessingState<D::Node>,
        source: &D::Node,
    ) -> Disposition {
        let disposition = self.evaluate_source(dom, state, source);
        tracing::debug!(?source, ?disposition, "Processed source");
        disposition
    }

    fn evaluate_image<D: Document>(
        &self,
        dom: &mut D,
        state: &mut ProcessingState<D::Node>,
        image: &D::Node,
    ) -> Disposition {
        if state.marks.is_marked(dom, image) {
            return Disposition::AlreadyProcessed;
        }

        if self.whitelist.matches(&ElementTarget::new(dom, image)) {
            state.marks.mark(dom, image);
            return Disposition::Whitelisted;
        }

        if dom
            .attribute(image, SRC_ATTRIBUTE)
            .is_some_and(|src| is_placeholder_url(&src))
        {
            state.marks.mark(dom, image);
            return Disposition::AlreadyTarget;
        }

        let url = ReplacementTarget::new(compute_seed(dom, image), compute_dimensions(dom, image)).url();

        match self.mode {
            ReplacementMode::All => {
                apply_image(dom, &state.marks, image, &url);
                listen(dom, image);
                Disposition::Replaced
            }
            ReplacementMode::Failed => match dom.load_state(image) {
                LoadState::Failed => {
                    apply_image(dom, &state.marks, image, &url);
                    Disposition::Replaced
                }
                LoadState::Loading => {
                    state.defer(dom, image, FailureAction::ReplaceImage { url });
                    Disposition::PendingFailure
                }
                LoadState::Loaded => Disposition::LeftIntact,
            },
        }
    }

    fn evaluate_source<D: Document>(
        &self,
        dom: &mut D,
        state: &mut ProcessingState<D::Node>,
        source: &D::Node,
    ) -> Disposition {
        if state.marks.is_marked(dom, source) {
            return Disposition::AlreadyProcessed;
        }

        let picture = dom.closest_picture(source);
        if let Some(picture) = &picture {
            let identity = PictureIdentity::read(dom, picture);
            if !identity.is_anonymous() && self.whitelist.matches(&identity) {
                state.marks.mark(dom, source);
                return Disposition::Whitelisted;
            }
        }

        if dom
            .attribute(source, SRCSET_ATTRIBUTE)
            .is_some_and(|srcset| is_placeholder_url(&srcset))
        {
            state.marks.mark(dom, source);
            return Disposition::AlreadyTarget;
        }

        let image = picture.and_then(|picture| dom.first_image(&picture));

        match (self.mode, image) {
            (ReplacementMode::All, image) => {
                replace_source(dom, &state.marks, source, image.as_ref());
                Disposition::Replaced
            }
            (ReplacementMode::Failed, None) => Disposition::LeftIntact,
            (ReplacementMode::Failed, Some(image)) => match dom.load_state(&image) {
                LoadState::Loaded => {
                    state.marks.mark(dom, source);
                    Disposition::LeftIntact
                }
                LoadState::Loading => {
                    state.defer(
                        dom,
                        &image,
                        FailureAction::ReplaceSource {
                            source: source.clone(),
                        },
                    );
                    Disposition::PendingFailure
                }
                LoadState::Failed => {
                    replace_source(dom, &state.marks, source, Some(&image));
                    Disposition::Replaced
                }
            },
        }
    }
}

fn apply_image<D: Document>(dom: &mut D, marks: &ProcessedMarks, image: &D::Node, url: &str) {
    dom.set_attribute(image, SRC_ATTRIBUTE, url);
    dom.add_class(image, MARKER_CLASS);
    dom.clear_style(image, "visibility");
    marks.mark(dom, image);
}

fn replace_source<D: Document>(
    dom: &mut D,
    marks: &ProcessedMarks,
    source: &D::Node,
    image: Option<&D::Node>,
) {
    let srcset = match image {
        Some(image) => match dom
            .attribute(image, SRC_ATTRIBUTE)
            .filter(|src| is_placeholder_url(src))
        {
            Some(reused) => reused,
            None => ReplacementTarget::new(compute_seed(dom, image), compute_dimensions(dom, image))
                .url(),
        },
        None => {
            let seed = rand::thread_rng().gen_range(0..RANDOM_SEED_BOUND);
            ReplacementTarget::new(seed, Dimensions::default()).url()
        }
    };

    dom.set_attribute(source, SRCSET_ATTRIBUTE, &srcset);
    dom.clear_style(source, "visibility");
    if dom.style(source, "opacity") == "0" {
        dom.clear_style(source, "opacity");
    }
    marks.mark(dom, source);
}
