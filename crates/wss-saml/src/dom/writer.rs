//! Serialization of the element tree back to XML text.

use std::fmt::Write as _;

use quick_xml::escape::escape;

use super::{Document, Element, Node};

impl Element {
    /// Serializes this element and its descendants.
    ///
    /// Namespace declarations are written exactly as present on each
    /// element; nothing is added or removed.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        write_element(&mut out, self);
        out
    }
}

impl Document {
    /// Serializes the document without an XML declaration.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for node in self.children() {
            write_node(&mut out, node);
        }
        out
    }
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Element(e) => write_element(out, e),
        Node::Text(text) => out.push_str(&escape(text.as_str())),
        Node::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        Node::ProcessingInstruction { target, data } if data.is_empty() => {
            let _ = write!(out, "<?{target}?>");
        }
        Node::ProcessingInstruction { target, data } => {
            let _ = write!(out, "<?{target} {data}?>");
        }
    }
}

fn write_element(out: &mut String, element: &Element) {
    let name = element.name().qualified();
    out.push('<');
    out.push_str(&name);
    for attr in element.attributes() {
        let _ = write!(
            out,
            " {}=\"{}\"",
            attr.name.qualified(),
            escape_attribute(&attr.value)
        );
    }
    if element.children().is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in element.children() {
        write_node(out, child);
    }
    let _ = write!(out, "</{name}>");
}

/// Escapes an attribute value, writing tab, newline and carriage return as
/// character references.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '"' => escaped.push_str("&quot;"),
            '\t' => escaped.push_str("&#x9;"),
            '\n' => escaped.push_str("&#xA;"),
            '\r' => escaped.push_str("&#xD;"),
            c => escaped.push(c),
        }
    }
    escaped
}
