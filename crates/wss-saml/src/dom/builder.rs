//! Builds an element tree from a stream of [`XmlEvent`]s.
//!
//! Open elements are kept on an ownership stack; closing one moves it into
//! its parent (or the document). Only the innermost open element is ever
//! mutated.

use tracing::trace;

use super::event::{StartElement, XmlEvent};
use super::{Attribute, Document, Element, Node};
use crate::error::{SamlError, SamlResult};

/// Default nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Outcome of feeding one event to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// More events are expected.
    Continue,
    /// `EndDocument` was seen; the tree is complete.
    Complete,
}

/// Incremental tree builder.
#[derive(Debug)]
pub struct StreamingDomBuilder {
    document: Document,
    open: Vec<Element>,
    max_depth: usize,
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Building,
    Complete,
    Failed,
}

impl Default for StreamingDomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingDomBuilder {
    /// Creates a builder with [`DEFAULT_MAX_DEPTH`].
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Creates a builder with a custom nesting limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            document: Document::new(),
            open: Vec::new(),
            max_depth,
            state: State::Building,
        }
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Feeds one event.
    ///
    /// Any error poisons the builder and discards partially built nodes.
    pub fn process(&mut self, event: XmlEvent) -> SamlResult<BuildStatus> {
        match self.state {
            State::Building => {}
            State::Complete => {
                return Err(SamlError::Parse(format!(
                    "{} after END_DOCUMENT",
                    event.kind()
                )))
            }
            State::Failed => {
                return Err(SamlError::Parse("builder failed on an earlier event".to_string()))
            }
        }
        match self.apply(event) {
            Ok(status) => {
                if status == BuildStatus::Complete {
                    self.state = State::Complete;
                }
                Ok(status)
            }
            Err(err) => {
                self.state = State::Failed;
                self.open.clear();
                self.document = Document::new();
                Err(err)
            }
        }
    }

    fn apply(&mut self, event: XmlEvent) -> SamlResult<BuildStatus> {
        trace!(kind = %event.kind(), depth = self.open.len(), "dom event");
        match event {
            XmlEvent::StartDocument => {}
            XmlEvent::StartElement(start) => self.open_element(start)?,
            XmlEvent::EndElement(_) => {
                if let Some(element) = self.open.pop() {
                    self.append(Node::Element(element));
                }
            }
            XmlEvent::Characters(text) => self.append(Node::Text(text)),
            XmlEvent::Comment(text) => self.append(Node::Comment(text)),
            XmlEvent::ProcessingInstruction { target, data } => {
                self.append(Node::ProcessingInstruction { target, data });
            }
            XmlEvent::Namespace(ns) => {
                self.current("NAMESPACE")?
                    .set_attribute(Attribute::namespace_declaration(ns.prefix.as_deref(), ns.uri));
            }
            XmlEvent::Attribute(attr) => self.current("ATTRIBUTE")?.set_attribute(attr),
            XmlEvent::EndDocument => return Ok(BuildStatus::Complete),
            event @ (XmlEvent::Dtd(_) | XmlEvent::EntityReference(_)) => {
                return Err(SamlError::Parse(format!(
                    "unsupported event {}",
                    event.kind()
                )))
            }
        }
        Ok(BuildStatus::Continue)
    }

    fn open_element(&mut self, start: StartElement) -> SamlResult<()> {
        if self.open.len() >= self.max_depth {
            return Err(SamlError::Parse(format!(
                "element nesting exceeds {} levels",
                self.max_depth
            )));
        }
        let mut element = Element::new(start.name);
        for ns in start.namespaces {
            element.set_attribute(Attribute::namespace_declaration(ns.prefix.as_deref(), ns.uri));
        }
        for attr in start.attributes {
            element.set_attribute(attr);
        }
        self.open.push(element);
        Ok(())
    }

    fn current(&mut self, kind: &str) -> SamlResult<&mut Element> {
        self.open
            .last_mut()
            .ok_or_else(|| SamlError::Parse(format!("{kind} outside of an element")))
    }

    fn append(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.append(node),
            None => self.document.append(node),
        }
    }

    /// Returns the built document.
    ///
    /// Fails if elements are still open or the builder was poisoned.
    pub fn finish(self) -> SamlResult<Document> {
        if self.state == State::Failed {
            return Err(SamlError::Parse("builder failed on an earlier event".to_string()));
        }
        if let Some(open) = self.open.last() {
            return Err(SamlError::Parse(format!(
                "unclosed element '{}'",
                open.name().qualified()
            )));
        }
        Ok(self.document)
    }

    /// Builds a document from a complete event sequence.
    pub fn build<I>(events: I) -> SamlResult<Document>
    where
        I: IntoIterator<Item = XmlEvent>,
    {
        let mut builder = Self::new();
        builder.feed(events)?;
        builder.finish()
    }

    /// Builds with this builder's settings from a complete event sequence.
    pub fn build_with<I>(mut self, events: I) -> SamlResult<Document>
    where
        I: IntoIterator<Item = XmlEvent>,
    {
        self.feed(events)?;
        self.finish()
    }

    fn feed<I>(&mut self, events: I) -> SamlResult<()>
    where
        I: IntoIterator<Item = XmlEvent>,
    {
        for event in events {
            if self.process(event)? == BuildStatus::Complete {
                break;
            }
        }
        Ok(())
    }

    /// Builds a single element subtree from the front of `events`.
    ///
    /// Consumes events up to and including the end tag of the first
    /// top-level element; anything after it is left in the iterator. Leading
    /// `StartDocument` and whitespace are ignored.
    pub fn build_subtree<I>(mut self, events: &mut I) -> SamlResult<Element>
    where
        I: Iterator<Item = XmlEvent>,
    {
        for event in events.by_ref() {
            let closes_root = matches!(event, XmlEvent::EndElement(_)) && self.open.len() == 1;
            if matches!(event, XmlEvent::EndDocument) {
                return Err(SamlError::Parse(
                    "END_DOCUMENT before the element was closed".to_string(),
                ));
            }
            self.process(event)?;
            if closes_root {
                return self.take_root();
            }
        }
        Err(SamlError::Parse("event stream ended inside an element".to_string()))
    }

    fn take_root(&mut self) -> SamlResult<Element> {
        std::mem::take(&mut self.document)
            .into_document_element()
            .ok_or_else(|| SamlError::Parse("no element was built".to_string()))
    }
}
