use image_swap::{Document, MemoryDocument, NodeId};
use scraper::{ElementRef, Html, Selector};

/// Build a parsed [MemoryDocument] whose body holds the body of `html`.
pub fn document_from_html(html: &str) -> MemoryDocument {
    let parsed = Html::parse_document(html);
    let mut document = MemoryDocument::new();
    let body = document.body().expect("a new document has a body");

    let selector = Selector::parse("body").expect("valid selector");
    if let Some(parsed_body) = parsed.select(&selector).next() {
        copy_children(&mut document, body, parsed_body);
    }
    document
}

fn copy_children(document: &mut MemoryDocument, parent: NodeId, from: ElementRef<'_>) {
    for child in from.children().filter_map(ElementRef::wrap) {
        let node = document.create_element(child.value().name());
        for (name, value) in child.value().attrs() {
            document.set_attribute(&node, name, value);
        }
        document.append_child(parent, node);
        copy_children(document, node, child);
    }
}

/// The element with the given `id`.
pub fn by_id(document: &MemoryDocument, id: &str) -> NodeId {
    document
        .element_by_id(id)
        .unwrap_or_else(|| panic!("no element with id '{id}'"))
}

/// The `src` of `node`, or an empty string.
pub fn src(document: &MemoryDocument, node: NodeId) -> String {
    document.attribute(&node, "src").unwrap_or_default()
}
