//! Owned XML element tree.
//!
//! Children are owned by their parent; there are no back references. A
//! namespace declaration is an attribute in the [`XMLNS_NS`] namespace whose
//! local name is the declared prefix (or `xmlns` for the default namespace).

mod builder;
mod event;
mod reader;
mod writer;

pub use builder::{BuildStatus, StreamingDomBuilder, DEFAULT_MAX_DEPTH};
pub use event::{EventKind, NamespaceDecl, StartElement, XmlEvent};
pub use reader::{read_events, EventReader};

use crate::error::SamlResult;

/// Namespace of `xmlns` attributes.
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    namespace: Option<String>,
    prefix: Option<String>,
    local: String,
}

impl QName {
    /// Creates a name with an optional namespace and no prefix.
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            prefix: None,
            local: local.into(),
        }
    }

    /// Creates a name without a namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, local)
    }

    /// Creates a prefixed name in `namespace`.
    pub fn prefixed(namespace: &str, prefix: &str, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
            local: local.into(),
        }
    }

    /// Sets the prefix; an empty prefix clears it.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Option<&str>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);
        self
    }

    /// Returns the namespace URI.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the prefix.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns the local part.
    pub fn local_name(&self) -> &str {
        &self.local
    }

    /// Returns `prefix:local`, or `local` when unprefixed.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }

    /// Returns true if namespace and local name match; the prefix is ignored.
    pub fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        self.namespace.as_deref() == namespace && self.local == local
    }
}

/// An attribute (including namespace declarations).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name.
    pub name: QName,
    /// Attribute value.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute.
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }

    /// Creates an `xmlns` / `xmlns:prefix` declaration.
    pub fn namespace_declaration(prefix: Option<&str>, uri: impl Into<String>) -> Self {
        let name = match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => QName::prefixed(XMLNS_NS, "xmlns", prefix),
            None => QName::new(Some(XMLNS_NS), "xmlns"),
        };
        Self::new(name, uri)
    }

    /// Returns true if this attribute declares a namespace.
    pub fn is_namespace_declaration(&self) -> bool {
        self.name.namespace() == Some(XMLNS_NS)
    }
}

/// A node in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Element node.
    Element(Element),
    /// Text node.
    Text(String),
    /// Comment node.
    Comment(String),
    /// Processing instruction.
    ProcessingInstruction {
        /// Instruction target.
        target: String,
        /// Instruction data.
        data: String,
    },
}

impl Node {
    /// Returns the element, if this node is one.
    pub const fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// An element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: QName,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Creates an empty element.
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an empty prefixed element in `namespace`.
    pub fn new_ns(namespace: &str, prefix: &str, local: &str) -> Self {
        Self::new(QName::prefixed(namespace, prefix, local))
    }

    /// Parses a standalone XML string and returns its document element.
    pub fn parse_str(xml: &str) -> SamlResult<Self> {
        Document::parse_str(xml)?
            .into_document_element()
            .ok_or_else(|| crate::SamlError::Parse("document has no element".to_string()))
    }

    /// Returns the element name.
    pub const fn name(&self) -> &QName {
        &self.name
    }

    /// Returns the local name.
    pub fn local_name(&self) -> &str {
        self.name.local_name()
    }

    /// Returns the namespace URI.
    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace()
    }

    /// Returns true if namespace and local name match.
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.name.is(Some(namespace), local)
    }

    /// Returns all attributes, namespace declarations included, in order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Sets an attribute, replacing one with the same namespace and local name.
    pub fn set_attribute(&mut self, attribute: Attribute) {
        if let Some(existing) = self.attributes.iter_mut().find(|a| {
            a.name.namespace() == attribute.name.namespace()
                && a.name.local_name() == attribute.name.local_name()
        }) {
            *existing = attribute;
        } else {
            self.attributes.push(attribute);
        }
    }

    /// Sets an unqualified attribute.
    pub fn set_attr(&mut self, local: &str, value: impl Into<String>) {
        self.set_attribute(Attribute::new(QName::local(local), value));
    }

    /// Declares a namespace on this element.
    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        self.set_attribute(Attribute::namespace_declaration(prefix, uri));
    }

    /// Builder form of [`Element::set_attr`].
    #[must_use]
    pub fn with_attr(mut self, local: &str, value: impl Into<String>) -> Self {
        self.set_attr(local, value);
        self
    }

    /// Builder form of [`Element::set_attr`] that skips `None`.
    #[must_use]
    pub fn with_opt_attr(mut self, local: &str, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.set_attr(local, value);
        }
        self
    }

    /// Returns the value of an unqualified attribute.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attr_ns(None, local)
    }

    /// Returns the value of a namespace-qualified attribute.
    pub fn attr_ns(&self, namespace: Option<&str>, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace, local))
            .map(|a| a.value.as_str())
    }

    /// Returns the namespace declarations on this element.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.attributes
            .iter()
            .filter(|a| a.is_namespace_declaration())
            .map(|a| {
                let prefix = a.name.prefix().map(|_| a.name.local_name());
                (prefix, a.value.as_str())
            })
    }

    /// Returns the child nodes.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Returns the child nodes mutably.
    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Appends a child node.
    pub fn append(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Appends a child element.
    pub fn append_element(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    /// Builder form of [`Element::append_element`].
    #[must_use]
    pub fn with_child(mut self, element: Element) -> Self {
        self.append_element(element);
        self
    }

    /// Builder form that appends a child only when present.
    #[must_use]
    pub fn with_opt_child(mut self, element: Option<Element>) -> Self {
        if let Some(element) = element {
            self.append_element(element);
        }
        self
    }

    /// Builder form that appends a text node.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Iterates over child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Iterates over child elements with the given name.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |e| e.is(namespace, local))
    }

    /// Returns the first child element with the given name.
    pub fn child(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(namespace, local))
    }

    /// Returns the concatenated text of direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the trimmed text of the first matching child element.
    pub fn child_text(&self, namespace: &str, local: &str) -> Option<String> {
        self.child(namespace, local).map(|e| e.text().trim().to_string())
    }

    /// Removes and returns every child element with the given name.
    pub fn remove_children(&mut self, namespace: &str, local: &str) -> Vec<Element> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.children.len());
        for node in self.children.drain(..) {
            match node {
                Node::Element(e) if e.is(namespace, local) => removed.push(e),
                other => kept.push(other),
            }
        }
        self.children = kept;
        removed
    }

    /// Inserts a child element after the last child named `(namespace, local)`,
    /// or first if there is none.
    pub fn insert_after(&mut self, namespace: &str, local: &str, element: Element) {
        let index = self
            .children
            .iter()
            .rposition(|n| n.as_element().is_some_and(|e| e.is(namespace, local)))
            .map_or(0, |i| i + 1);
        self.children.insert(index, Node::Element(element));
    }
}

/// A document: an ordered list of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    children: Vec<Node>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an XML string through the streaming builder.
    pub fn parse_str(xml: &str) -> SamlResult<Self> {
        StreamingDomBuilder::build(read_events(xml)?)
    }

    /// Returns the top-level nodes.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Appends a top-level node.
    pub fn append(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Removes and returns every top-level node.
    pub fn take_children(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.children)
    }

    /// Replaces the top-level nodes.
    pub fn restore_children(&mut self, children: Vec<Node>) {
        self.children = children;
    }

    /// Returns the first top-level element.
    pub fn document_element(&self) -> Option<&Element> {
        self.children.iter().find_map(Node::as_element)
    }

    /// Consumes the document and returns its first top-level element.
    pub fn into_document_element(self) -> Option<Element> {
        self.children.into_iter().find_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "urn:example";

    #[test]
    fn set_attribute_replaces_same_name() {
        let mut e = Element::new_ns(NS, "ex", "Root");
        e.set_attr("ID", "a");
        e.set_attr("ID", "b");
        assert_eq!(e.attr("ID"), Some("b"));
        assert_eq!(e.attributes().len(), 1);
    }

    #[test]
    fn namespace_declarations_are_attributes() {
        let mut e = Element::new_ns(NS, "ex", "Root");
        e.declare_namespace(Some("ex"), NS);
        e.declare_namespace(None, "urn:default");

        let decls: Vec<_> = e.namespace_declarations().collect();
        assert_eq!(decls, vec![(Some("ex"), NS), (None, "urn:default")]);
        assert_eq!(e.attributes()[0].name.qualified(), "xmlns:ex");
        assert_eq!(e.attributes()[1].name.qualified(), "xmlns");
    }

    #[test]
    fn child_lookup_and_removal() {
        let mut root = Element::new_ns(NS, "ex", "Root")
            .with_child(Element::new_ns(NS, "ex", "A").with_text(" one "))
            .with_child(Element::new_ns(NS, "ex", "B"))
            .with_child(Element::new_ns(NS, "ex", "A"));

        assert_eq!(root.children_named(NS, "A").count(), 2);
        assert_eq!(root.child_text(NS, "A").as_deref(), Some("one"));

        let removed = root.remove_children(NS, "A");
        assert_eq!(removed.len(), 2);
        assert_eq!(root.child_elements().count(), 1);
    }

    #[test]
    fn insert_after_named_child() {
        let mut root = Element::new_ns(NS, "ex", "Root")
            .with_child(Element::new_ns(NS, "ex", "Issuer"))
            .with_child(Element::new_ns(NS, "ex", "Subject"));
        root.insert_after(NS, "Issuer", Element::new_ns(NS, "ex", "Signature"));

        let names: Vec<_> = root.child_elements().map(Element::local_name).collect();
        assert_eq!(names, vec!["Issuer", "Signature", "Subject"]);

        let mut empty = Element::new_ns(NS, "ex", "Root").with_child(Element::new_ns(NS, "ex", "X"));
        empty.insert_after(NS, "Issuer", Element::new_ns(NS, "ex", "First"));
        assert_eq!(empty.child_elements().next().map(Element::local_name), Some("First"));
    }

    #[test]
    fn document_children_can_be_relocated() {
        let mut doc = Document::new();
        doc.append(Node::Comment("c".to_string()));
        doc.append(Node::Element(Element::new(QName::local("root"))));

        let saved = doc.take_children();
        assert!(doc.children().is_empty());
        doc.restore_children(saved);
        assert_eq!(doc.children().len(), 2);
        assert_eq!(doc.document_element().map(Element::local_name), Some("root"));
    }
}
