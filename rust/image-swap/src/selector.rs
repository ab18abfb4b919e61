//! Whitelist matching.
//!
//! Anything that can answer "do you match this selector?" implements
//! [`SelectorTarget`]. Real elements delegate to their host (a browser's own
//! `Element.matches`). A [`PictureIdentity`] (the id and classes of a
//! `<picture>` that wraps a `<source>`) has no element behind it, so it is
//! matched as a lone `<picture>` in a detached [scraper] tree, the same
//! engine that backs [`crate::MemoryDocument`].

use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node, Selector};

use crate::{Document, SelectorError};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Parse a comma separated CSS selector list.
pub fn parse_selector(text: &str) -> Result<Selector, SelectorError> {
    Selector::parse(text).map_err(|error| SelectorError::Malformed {
        selector: text.to_owned(),
        reason: error.to_string(),
    })
}

/// An HTML element named `tag`, ready to be appended to a [scraper] tree.
pub(crate) fn html_element<'a>(
    tag: &str,
    attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Node {
    let attributes = attributes
        .into_iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
            value: StrTendril::from_slice(value),
        })
        .collect();

    Node::Element(Element::new(
        QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag)),
        attributes,
    ))
}

/// A text node for a [scraper] tree.
pub(crate) fn html_text(text: &str) -> Node {
    Node::Text(Text {
        text: StrTendril::from_slice(text),
    })
}

/// Something a whitelist selector can be evaluated against.
pub trait SelectorTarget {
    /// Whether this target matches `selector`.
    fn matches_selector(&self, selector: &str) -> Result<bool, SelectorError>;
}

/// A live element, matched by its host document.
pub struct ElementTarget<'a, D: Document> {
    dom: &'a D,
    node: &'a D::Node,
}

impl<'a, D: Document> ElementTarget<'a, D> {
    /// Wrap `node` of `dom`.
    pub fn new(dom: &'a D, node: &'a D::Node) -> Self {
        Self { dom, node }
    }
}

impl<D: Document> SelectorTarget for ElementTarget<'_, D> {
    fn matches_selector(&self, selector: &str) -> Result<bool, SelectorError> {
        self.dom.matches_selector(self.node, selector)
    }
}

/// The identity of a `<picture>` element: the only part of it a whitelist
/// can see when deciding about one of its `<source>` children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureIdentity {
    /// `id` of the picture
    pub id: String,
    /// Classes of the picture
    pub class_names: Vec<String>,
}

impl PictureIdentity {
    /// Read the identity of `picture`.
    pub fn read<D: Document>(dom: &D, picture: &D::Node) -> Self {
        Self {
            id: dom.attribute(picture, "id").unwrap_or_default(),
            class_names: dom
                .attribute(picture, "class")
                .map(|class| class.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default(),
        }
    }

    /// A picture without id or classes has nothing to whitelist it by.
    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty() && self.class_names.is_empty()
    }
}

impl SelectorTarget for PictureIdentity {
    fn matches_selector(&self, selector: &str) -> Result<bool, SelectorError> {
        let selector = parse_selector(selector)?;

        let class = self.class_names.join(" ");
        let mut attributes = Vec::new();
        if !self.id.is_empty() {
            attributes.push(("id", self.id.as_str()));
        }
        if !class.is_empty() {
            attributes.push(("class", class.as_str()));
        }

        let mut fragment = Html::new_fragment();
        let picture = fragment
            .tree
            .root_mut()
            .append(html_element("picture", attributes))
            .id();

        Ok(fragment
            .tree
            .get(picture)
            .and_then(ElementRef::wrap)
            .is_some_and(|picture| selector.matches(&picture)))
    }
}

/// The user's list of selectors whose matches are never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    selectors: Vec<String>,
}

impl Whitelist {
    /// A whitelist over the given selectors.
    pub fn new(selectors: Vec<String>) -> Self {
        Self { selectors }
    }

    /// Whether any selector matches `target`. A selector that cannot be
    /// evaluated counts as not matching.
    pub fn matches(&self, target: &impl SelectorTarget) -> bool {
        self.selectors
            .iter()
            .any(|selector| match target.matches_selector(selector) {
                Ok(matched) => matched,
                Err(error) => {
                    tracing::debug!(%error, "Skipping whitelist selector");
                    false
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picture(id: &str, classes: &[&str]) -> PictureIdentity {
        PictureIdentity {
            id: id.to_owned(),
            class_names: classes.iter().map(|class| class.to_string()).collect(),
        }
    }

    #[test]
    fn it_matches_picture_identity_by_id_and_class() {
        let hero = picture("hero", &["wide", "banner"]);

        assert_eq!(hero.matches_selector("#hero"), Ok(true));
        assert_eq!(hero.matches_selector(".banner"), Ok(true));
        assert_eq!(hero.matches_selector("picture.wide.banner"), Ok(true));
        assert_eq!(hero.matches_selector("#other, .wide"), Ok(true));
        assert_eq!(hero.matches_selector("img.wide"), Ok(false));
        assert_eq!(hero.matches_selector(".narrow"), Ok(false));
    }

    #[test]
    fn it_never_matches_ancestry_on_a_picture_identity() {
        let hero = picture("hero", &[]);
        assert_eq!(hero.matches_selector("div #hero"), Ok(false));
        assert_eq!(hero.matches_selector("body > #hero"), Ok(false));
    }

    #[test]
    fn it_rejects_malformed_selectors() {
        assert!(parse_selector("").is_err());
        assert!(parse_selector("a,,b").is_err());
        assert!(parse_selector("div > ").is_err());
        assert!(parse_selector("#").is_err());
        assert!(matches!(
            picture("hero", &[]).matches_selector("::nonsense(("),
            Err(SelectorError::Malformed { .. })
        ));
    }

    #[test]
    fn it_understands_the_full_selector_grammar() {
        let hero = picture("hero-banner", &["wide"]);

        assert_eq!(hero.matches_selector("[id^=hero]"), Ok(true));
        assert_eq!(hero.matches_selector("[id$=banner]"), Ok(true));
        assert_eq!(hero.matches_selector("picture:not(.narrow)"), Ok(true));
        assert_eq!(hero.matches_selector("[class~=wide]"), Ok(true));
        assert_eq!(hero.matches_selector(".wide:first-child"), Ok(true));
        assert_eq!(hero.matches_selector(":is(#hero-banner, .narrow)"), Ok(true));
        assert_eq!(hero.matches_selector("picture.wide ~ *"), Ok(false));
        assert_eq!(hero.matches_selector("[id^=footer]"), Ok(false));

        assert!(Whitelist::new(vec!["[id^=hero]".into()]).matches(&hero));
    }

    #[test]
    fn it_parses_attribute_selectors() {
        let identity = picture("x", &["a"]);
        assert_eq!(identity.matches_selector("[id]"), Ok(true));
        assert_eq!(identity.matches_selector("[id='x']"), Ok(true));
        assert_eq!(identity.matches_selector("[class=\"a\"]"), Ok(true));
        assert_eq!(identity.matches_selector("[title]"), Ok(false));
    }

    #[test]
    fn it_treats_broken_selectors_as_non_matching() {
        let whitelist = Whitelist::new(vec!["::nonsense((".into(), "#hero".into()]);
        assert!(whitelist.matches(&picture("hero", &[])));

        let whitelist = Whitelist::new(vec!["::nonsense((".into()]);
        assert!(!whitelist.matches(&picture("hero", &[])));
    }
}
