//! Pull-parser events consumed by the streaming builder.

use std::fmt;

use super::{Attribute, QName};

/// A namespace declaration carried by a start element or a standalone event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// Declared prefix; `None` for the default namespace.
    pub prefix: Option<String>,
    /// Namespace URI.
    pub uri: String,
}

impl NamespaceDecl {
    /// Creates a declaration.
    pub fn new(prefix: Option<&str>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            uri: uri.into(),
        }
    }
}

/// Payload of a start-element event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
    /// Element name.
    pub name: QName,
    /// Namespace declarations on the element.
    pub namespaces: Vec<NamespaceDecl>,
    /// Attributes other than namespace declarations.
    pub attributes: Vec<Attribute>,
}

impl StartElement {
    /// Creates a start element without attributes.
    pub fn new(name: QName) -> Self {
        Self {
            name,
            namespaces: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

/// One pull-parser event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Start of the document.
    StartDocument,
    /// Start of an element.
    StartElement(StartElement),
    /// End of the current element.
    EndElement(QName),
    /// Character data (text or CDATA).
    Characters(String),
    /// Comment.
    Comment(String),
    /// Processing instruction.
    ProcessingInstruction {
        /// Instruction target.
        target: String,
        /// Instruction data.
        data: String,
    },
    /// Namespace declaration on the current element.
    Namespace(NamespaceDecl),
    /// Attribute on the current element.
    Attribute(Attribute),
    /// Document type declaration. Not supported.
    Dtd(String),
    /// Unexpanded entity reference. Not supported.
    EntityReference(String),
    /// End of the document.
    EndDocument,
}

/// Discriminant of an [`XmlEvent`], used in diagnostics.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    StartDocument,
    StartElement,
    EndElement,
    Characters,
    Comment,
    ProcessingInstruction,
    Namespace,
    Attribute,
    Dtd,
    EntityReference,
    EndDocument,
}

impl XmlEvent {
    /// Returns the event kind.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StartDocument => EventKind::StartDocument,
            Self::StartElement(_) => EventKind::StartElement,
            Self::EndElement(_) => EventKind::EndElement,
            Self::Characters(_) => EventKind::Characters,
            Self::Comment(_) => EventKind::Comment,
            Self::ProcessingInstruction { .. } => EventKind::ProcessingInstruction,
            Self::Namespace(_) => EventKind::Namespace,
            Self::Attribute(_) => EventKind::Attribute,
            Self::Dtd(_) => EventKind::Dtd,
            Self::EntityReference(_) => EventKind::EntityReference,
            Self::EndDocument => EventKind::EndDocument,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StartDocument => "START_DOCUMENT",
            Self::StartElement => "START_ELEMENT",
            Self::EndElement => "END_ELEMENT",
            Self::Characters => "CHARACTERS",
            Self::Comment => "COMMENT",
            Self::ProcessingInstruction => "PROCESSING_INSTRUCTION",
            Self::Namespace => "NAMESPACE",
            Self::Attribute => "ATTRIBUTE",
            Self::Dtd => "DTD",
            Self::EntityReference => "ENTITY_REFERENCE",
            Self::EndDocument => "END_DOCUMENT",
        };
        f.write_str(s)
    }
}
