//! Bridges the HTML5 parser to the XPath engine.
//!
//! `scraper` parses real-world HTML leniently but has no XPath; `sxd-xpath`
//! evaluates XPath but only over an `sxd-document` tree. The parsed HTML is
//! copied element by element into a fresh package. Text nodes are copied
//! verbatim, including whitespace-only ones.

use ::scraper::{ElementRef, Html, Node};
use sxd_document::Package;
use sxd_document::dom::{Document, Element};

pub fn html_to_package(html: &str) -> Package {
    let parsed = Html::parse_document(html);
    let package = Package::new();
    {
        let doc = package.as_document();
        let root = parsed.root_element();
        let element = copy_element(&doc, root);
        doc.root().append_child(element);
    }
    package
}

fn copy_element<'d>(doc: &Document<'d>, source: ElementRef<'_>) -> Element<'d> {
    let value = source.value();
    let element = doc.create_element(value.name());
    for (name, attr_value) in value.attrs() {
        element.set_attribute_value(name, attr_value);
    }

    for child in source.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    element.append_child(copy_element(doc, child_ref));
                }
            }
            Node::Text(text) => {
                element.append_child(doc.create_text(text));
            }
            Node::Comment(comment) => {
                element.append_child(doc.create_comment(comment));
            }
            _ => {}
        }
    }
    element
}
