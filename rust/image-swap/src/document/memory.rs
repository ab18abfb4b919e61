use std::collections::BTreeMap;

use scraper::{ElementRef, Html};

use crate::constants::OBSERVED_ATTRIBUTES;
use crate::selector::{html_element, html_text};
use crate::{Document, ElementKind, LoadState, Mutation, SelectorError, parse_selector};

/// Handle to an element of a [MemoryDocument].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    inline_style: BTreeMap<String, String>,
    computed_style: BTreeMap<String, String>,
    text: String,
    load_state: LoadState,
    processed_epoch: Option<u64>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
            inline_style: BTreeMap::new(),
            computed_style: BTreeMap::new(),
            text: String::new(),
            load_state: LoadState::Loading,
            processed_epoch: None,
        }
    }
}

/// A trivial implementation of [Document] where the page is an element tree
/// held in memory. Nothing is rendered and nothing is fetched: load states
/// and computed styles are whatever the owner sets them to.
///
/// Mutations are recorded only while an observer is installed, and only
/// those the installed observer would see, so the queue returned by
/// [MemoryDocument::take_mutations] is exactly what a browser would have
/// delivered.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    elements: Vec<Element>,
    root: NodeId,
    head: NodeId,
    loading: bool,
    observed_body: Option<NodeId>,
    observing_root: bool,
    mutations: Vec<Mutation<NodeId>>,
    error_watches: Vec<NodeId>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// An empty, fully parsed document with `<html>`, `<head>` and `<body>`.
    pub fn new() -> Self {
        let mut document = Self::without_body();
        let body = document.create_element("body");
        document.append_child(document.root, body);
        document
    }

    /// A document whose parser has not produced `<body>` yet.
    pub fn without_body() -> Self {
        let mut document = Self {
            elements: vec![Element::new("html")],
            root: NodeId(0),
            head: NodeId(0),
            loading: false,
            observed_body: None,
            observing_root: false,
            mutations: Vec::new(),
            error_watches: Vec::new(),
        };
        document.head = document.create_element("head");
        document.append_child(document.root, document.head);
        document
    }

    /// The `<html>` element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<head>` element.
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// Mark the document as still parsing, or as parsed.
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.elements.push(Element::new(tag));
        NodeId(self.elements.len() - 1)
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.element_mut(parent).children.push(child);
        self.element_mut(child).parent = Some(parent);
        self.record(parent, Mutation::ChildList { added: vec![child] });
    }

    /// Detach `node` from its parent.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    /// Lowercase tag name of `node`.
    pub fn tag(&self, node: NodeId) -> &str {
        &self.element(node).tag
    }

    /// Parent of `node`.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.element(node).parent
    }

    /// Children of `node`, in order.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.element(node).children
    }

    /// Text content held directly by `node`.
    pub fn text(&self, node: NodeId) -> &str {
        &self.element(node).text
    }

    /// Replace the text content held directly by `node`.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.element_mut(node).text = text.to_owned();
    }

    /// Set the load state an image reports.
    pub fn set_load_state(&mut self, node: NodeId, state: LoadState) {
        self.element_mut(node).load_state = state;
    }

    /// Set what layout reports for `property` of `node`.
    pub fn set_computed_style(&mut self, node: NodeId, property: &str, value: &str) {
        self.element_mut(node)
            .computed_style
            .insert(property.to_owned(), value.to_owned());
    }

    /// Set an inline style property on `node`.
    pub fn set_inline_style(&mut self, node: NodeId, property: &str, value: &str) {
        self.element_mut(node)
            .inline_style
            .insert(property.to_owned(), value.to_owned());
    }

    /// Whether `node` carries `class`.
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute_value(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|name| name == class))
    }

    /// The first attached element whose `id` is `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|node| self.attribute_value(*node, "id").as_deref() == Some(id))
    }

    /// Drain the mutations recorded by the installed observers.
    pub fn take_mutations(&mut self) -> Vec<Mutation<NodeId>> {
        std::mem::take(&mut self.mutations)
    }

    /// Make `node` fail to load. Returns `true` if a load error watch was
    /// pending for it; every pending watch for `node` is consumed.
    pub fn fail_load(&mut self, node: NodeId) -> bool {
        self.element_mut(node).load_state = LoadState::Failed;
        let before = self.error_watches.len();
        self.error_watches.retain(|watched| *watched != node);
        before != self.error_watches.len()
    }

    /// Number of load error watches pending for `node`.
    pub fn error_watch_count(&self, node: NodeId) -> usize {
        self.error_watches
            .iter()
            .filter(|watched| **watched == node)
            .count()
    }

    fn element(&self, node: NodeId) -> &Element {
        &self.elements[node.0]
    }

    fn element_mut(&mut self, node: NodeId) -> &mut Element {
        &mut self.elements[node.0]
    }

    fn attribute_value(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn write_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let element = self.element_mut(node);
        match element.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => element
                .attributes
                .push((name.to_owned(), value.to_owned())),
        }
        if element.tag == "img" && name == "src" {
            element.load_state = LoadState::Loading;
        }

        self.record(
            node,
            Mutation::Attribute {
                target: node,
                name: name.to_owned(),
            },
        );
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.element_mut(node).parent.take() {
            self.element_mut(parent)
                .children
                .retain(|child| *child != node);
        }
    }

    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.element(node).children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            found.push(next);
            stack.extend(self.element(next).children.iter().rev().copied());
        }
        found
    }

    fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.element(candidate).parent;
        }
        false
    }

    fn topmost(&self, node: NodeId) -> NodeId {
        let mut top = node;
        while let Some(parent) = self.parent(top) {
            top = parent;
        }
        top
    }

    /// Copy the tree holding `node` into a [scraper] document so selectors
    /// can be evaluated against it. A detached subtree becomes a fragment.
    fn mirror(&self, node: NodeId) -> Mirror {
        let top = self.topmost(node);

        let mut tree = if top == self.root {
            Html::new_document()
        } else {
            Html::new_fragment()
        };
        let mut target = None;

        let mut stack = vec![(top, tree.tree.root().id())];
        while let Some((element, parent)) = stack.pop() {
            let Some(mut parent) = tree.tree.get_mut(parent) else {
                continue;
            };
            let attributes = self
                .element(element)
                .attributes
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()));
            let mut mirrored = parent.append(html_element(self.tag(element), attributes));

            let text = self.text(element);
            if !text.is_empty() {
                mirrored.append(html_text(text));
            }

            let id = mirrored.id();
            if element == node {
                target = Some(id);
            }
            stack.extend(
                self.children(element)
                    .iter()
                    .rev()
                    .map(|child| (*child, id)),
            );
        }

        Mirror { tree, target }
    }

    fn record(&mut self, target: NodeId, mutation: Mutation<NodeId>) {
        let seen_by_body = self
            .observed_body
            .is_some_and(|body| self.is_inclusive_descendant(target, body))
            && match &mutation {
                Mutation::ChildList { .. } => true,
                Mutation::Attribute { name, .. } => OBSERVED_ATTRIBUTES.contains(&name.as_str()),
            };
        let seen_by_root = self.observing_root
            && target == self.root
            && matches!(mutation, Mutation::ChildList { .. });

        if seen_by_body || seen_by_root {
            self.mutations.push(mutation);
        }
    }
}

struct Mirror {
    tree: Html,
    target: Option<ego_tree::NodeId>,
}

impl Document for MemoryDocument {
    type Node = NodeId;

    fn body(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|child| self.tag(*child) == "body")
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        self.topmost(*node) == self.root
    }

    fn kind(&self, node: &NodeId) -> ElementKind {
        match self.tag(*node) {
            "img" => ElementKind::Image,
            "source" => ElementKind::Source,
            "picture" => ElementKind::Picture,
            _ => ElementKind::Other,
        }
    }

    fn closest_picture(&self, node: &NodeId) -> Option<NodeId> {
        let mut current = Some(*node);
        while let Some(candidate) = current {
            if self.tag(candidate) == "picture" {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    fn first_image(&self, node: &NodeId) -> Option<NodeId> {
        self.descendants(*node)
            .into_iter()
            .find(|candidate| self.tag(*candidate) == "img")
    }

    fn images(&self, within: Option<&NodeId>) -> Vec<NodeId> {
        self.descendants(within.copied().unwrap_or(self.root))
            .into_iter()
            .filter(|candidate| self.tag(*candidate) == "img")
            .collect()
    }

    fn picture_sources(&self, within: Option<&NodeId>) -> Vec<NodeId> {
        self.descendants(within.copied().unwrap_or(self.root))
            .into_iter()
            .filter(|candidate| {
                self.tag(*candidate) == "source"
                    && self
                        .parent(*candidate)
                        .is_some_and(|parent| self.tag(parent) == "picture")
            })
            .collect()
    }

    fn matches_selector(&self, node: &NodeId, selector: &str) -> Result<bool, SelectorError> {
        let selector = parse_selector(selector)?;
        let mirror = self.mirror(*node);

        Ok(mirror
            .target
            .and_then(|target| mirror.tree.tree.get(target))
            .and_then(ElementRef::wrap)
            .is_some_and(|element| selector.matches(&element)))
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.attribute_value(*node, name)
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        self.write_attribute(*node, name, value);
    }

    fn add_class(&mut self, node: &NodeId, class: &str) {
        if self.has_class(*node, class) {
            return;
        }
        let classes = match self.attribute_value(*node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_owned(),
        };
        self.write_attribute(*node, "class", &classes);
    }

    fn style(&self, node: &NodeId, property: &str) -> String {
        self.element(*node)
            .inline_style
            .get(property)
            .cloned()
            .unwrap_or_default()
    }

    fn clear_style(&mut self, node: &NodeId, property: &str) {
        self.element_mut(*node).inline_style.remove(property);
    }

    fn computed_style(&self, node: &NodeId, property: &str) -> Option<String> {
        self.element(*node).computed_style.get(property).cloned()
    }

    fn load_state(&self, node: &NodeId) -> LoadState {
        self.element(*node).load_state
    }

    fn processed_epoch(&self, node: &NodeId) -> Option<u64> {
        self.element(*node).processed_epoch
    }

    fn set_processed_epoch(&mut self, node: &NodeId, epoch: Option<u64>) {
        self.element_mut(*node).processed_epoch = epoch;
    }

    fn watch_load_error(&mut self, node: &NodeId) {
        self.error_watches.push(*node);
    }

    fn is_watching_load_error(&self, node: &NodeId) -> bool {
        self.error_watches.contains(node)
    }

    fn install_style(&mut self, id: &str, css: &str) {
        if let Some(existing) = self.element_by_id(id) {
            self.remove(existing);
        }
        let style = self.create_element("style");
        self.write_attribute(style, "id", id);
        self.set_text(style, css);
        self.append_child(self.head, style);
    }

    fn observe_body(&mut self, body: &NodeId) {
        self.observed_body = Some(*body);
    }

    fn observe_root(&mut self) {
        self.observing_root = true;
    }

    fn disconnect_root(&mut self) {
        self.observing_root = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_matches_descendant_and_child_selectors() {
        let mut document = MemoryDocument::new();
        let body = document.body().unwrap();
        let gallery = document.create_element("div");
        document.set_attribute(&gallery, "class", "gallery dark");
        let figure = document.create_element("figure");
        let image = document.create_element("img");
        document.set_attribute(&image, "id", "shot");
        document.append_child(body, gallery);
        document.append_child(gallery, figure);
        document.append_child(figure, image);

        assert_eq!(document.matches_selector(&image, ".gallery img"), Ok(true));
        assert_eq!(document.matches_selector(&image, "div.dark #shot"), Ok(true));
        assert_eq!(document.matches_selector(&image, "figure > img"), Ok(true));
        assert_eq!(document.matches_selector(&image, ".gallery > img"), Ok(false));
        assert_eq!(document.matches_selector(&image, "html body img"), Ok(true));
        assert_eq!(document.matches_selector(&image, "img:first-child"), Ok(true));
        assert_eq!(document.matches_selector(&image, ":root img"), Ok(true));
        assert!(document.matches_selector(&image, "img >").is_err());
    }

    #[test]
    fn it_matches_sibling_and_attribute_selectors() {
        let mut document = MemoryDocument::new();
        let body = document.body().unwrap();
        let caption = document.create_element("p");
        document.set_text(caption, "Sunset");
        let image = document.create_element("img");
        document.set_attribute(&image, "src", "/photos/sunset.jpg");
        document.set_attribute(&image, "data-role", "hero banner");
        document.append_child(body, caption);
        document.append_child(body, image);

        assert_eq!(document.matches_selector(&image, "p + img"), Ok(true));
        assert_eq!(document.matches_selector(&image, "p ~ img[src$='.jpg']"), Ok(true));
        assert_eq!(document.matches_selector(&image, "[data-role~=hero]"), Ok(true));
        assert_eq!(document.matches_selector(&image, "img:first-child"), Ok(false));
        assert_eq!(document.matches_selector(&caption, "p:empty"), Ok(false));
    }

    #[test]
    fn it_matches_detached_elements_within_their_own_subtree() {
        let mut document = MemoryDocument::new();
        let card = document.create_element("div");
        document.set_attribute(&card, "class", "card");
        let image = document.create_element("img");
        document.append_child(card, image);

        assert_eq!(document.matches_selector(&image, ".card > img"), Ok(true));
        assert_eq!(document.matches_selector(&image, "body img"), Ok(false));
    }

    #[test]
    fn it_reports_only_what_installed_observers_see() {
        let mut document = MemoryDocument::new();
        let body = document.body().unwrap();
        let early = document.create_element("img");
        document.append_child(body, early);
        assert!(document.take_mutations().is_empty());

        document.observe_body(&body);
        let image = document.create_element("img");
        document.append_child(body, image);
        document.set_attribute(&image, "src", "a.png");
        document.set_attribute(&image, "alt", "ignored");
        document.add_class(&image, "ignored-too");
        document.install_style("style-id", "img {}");

        assert_eq!(
            document.take_mutations(),
            vec![
                Mutation::ChildList {
                    added: vec![image]
                },
                Mutation::Attribute {
                    target: image,
                    name: "src".into()
                },
            ]
        );
    }

    #[test]
    fn it_queries_images_and_picture_sources_in_document_order() {
        let mut document = MemoryDocument::new();
        let body = document.body().unwrap();
        let picture = document.create_element("picture");
        let source = document.create_element("source");
        let inner = document.create_element("img");
        let stray = document.create_element("source");
        let outer = document.create_element("img");
        document.append_child(body, picture);
        document.append_child(picture, source);
        document.append_child(picture, inner);
        document.append_child(body, stray);
        document.append_child(body, outer);

        assert_eq!(document.images(None), vec![inner, outer]);
        assert_eq!(document.picture_sources(None), vec![source]);
        assert_eq!(document.picture_sources(Some(&picture)), vec![source]);
        assert_eq!(document.first_image(&picture), Some(inner));
        assert_eq!(document.closest_picture(&source), Some(picture));
        assert_eq!(document.closest_picture(&stray), None);
    }

    #[test]
    fn it_replaces_installed_styles() {
        let mut document = MemoryDocument::new();
        document.install_style("s", "a {}");
        document.install_style("s", "b {}");

        let style = document.element_by_id("s").unwrap();
        assert_eq!(document.text(style), "b {}");
        assert_eq!(document.children(document.head()), &[style]);
    }
}
