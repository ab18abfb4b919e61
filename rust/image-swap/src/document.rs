use crate::SelectorError;

mod memory;
pub use memory::*;

/// The element types the policy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// `<img>`
    Image,
    /// `<source>`
    Source,
    /// `<picture>`
    Picture,
    /// Anything else
    Other,
}

/// How far an image has come in loading its current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Not complete yet
    Loading,
    /// Complete, with natural dimensions
    Loaded,
    /// Complete, without natural dimensions
    Failed,
}

/// A DOM change as reported by the host's mutation observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<Node> {
    /// Elements were inserted
    ChildList {
        /// The inserted elements; non-element nodes are never reported
        added: Vec<Node>,
    },
    /// An observed attribute changed
    Attribute {
        /// The element whose attribute changed
        target: Node,
        /// The attribute's name
        name: String,
    },
}

/// A [Document] is a facade over the page the content script runs in.
///
/// It is the only way the engine reads or mutates the page, so the engine
/// runs unchanged against a browser DOM or an in-memory
/// [MemoryDocument]. All methods are synchronous: the host page's UI thread
/// is the only thread there is.
pub trait Document {
    /// A handle to an element. Cloning a handle never clones the element.
    type Node: Clone + PartialEq + std::fmt::Debug;

    /// The `<body>` element, if the parser has produced it yet.
    fn body(&self) -> Option<Self::Node>;

    /// Whether the document is still being parsed (`DOMContentLoaded` has
    /// not fired yet).
    fn is_loading(&self) -> bool;

    /// Whether `node` is attached to the document.
    fn is_connected(&self, node: &Self::Node) -> bool;

    /// The kind of `node`.
    fn kind(&self, node: &Self::Node) -> ElementKind;

    /// The nearest inclusive ancestor of `node` that is a `<picture>`.
    fn closest_picture(&self, node: &Self::Node) -> Option<Self::Node>;

    /// The first `<img>` descendant of `node`, in document order.
    fn first_image(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Every `<img>` descendant of `within`, or of the whole document.
    fn images(&self, within: Option<&Self::Node>) -> Vec<Self::Node>;

    /// Every `picture > source` descendant of `within`, or of the whole
    /// document.
    fn picture_sources(&self, within: Option<&Self::Node>) -> Vec<Self::Node>;

    /// Whether `node` matches the CSS `selector`.
    fn matches_selector(&self, node: &Self::Node, selector: &str) -> Result<bool, SelectorError>;

    /// The value of attribute `name` on `node`.
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Set attribute `name` on `node`.
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    /// Add `class` to the class list of `node`.
    fn add_class(&mut self, node: &Self::Node, class: &str);

    /// The inline style value of `property` on `node` (empty when unset).
    fn style(&self, node: &Self::Node, property: &str) -> String;

    /// Remove `property` from the inline style of `node`.
    fn clear_style(&mut self, node: &Self::Node, property: &str);

    /// The computed (rendered) value of `property` for `node`.
    fn computed_style(&self, node: &Self::Node, property: &str) -> Option<String>;

    /// The load state of an image.
    fn load_state(&self, node: &Self::Node) -> LoadState;

    /// The processing epoch `node` was tagged with, if any.
    fn processed_epoch(&self, node: &Self::Node) -> Option<u64>;

    /// Tag `node` with a processing epoch, or remove the tag.
    fn set_processed_epoch(&mut self, node: &Self::Node, epoch: Option<u64>);

    /// Arrange for the next load error of `node` to be delivered to the
    /// engine once.
    fn watch_load_error(&mut self, node: &Self::Node);

    /// Whether a listener installed by [Document::watch_load_error] on
    /// `node` is still waiting for its error.
    fn is_watching_load_error(&self, node: &Self::Node) -> bool;

    /// Replace the `<style>` element with the given `id` (if any) with a
    /// new one in `<head>` holding `css`.
    fn install_style(&mut self, id: &str, css: &str);

    /// Start reporting insertions into, and `src`/`srcset` changes within,
    /// the subtree of `body`.
    fn observe_body(&mut self, body: &Self::Node);

    /// Start reporting insertions of children of the document root.
    fn observe_root(&mut self);

    /// Stop reporting insertions of children of the document root.
    fn disconnect_root(&mut self);
}
