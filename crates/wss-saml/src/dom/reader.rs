//! Adapts a namespace-aware `quick-xml` reader to [`XmlEvent`]s.

use std::collections::VecDeque;

use quick_xml::events::attributes::Attribute as RawAttribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use quick_xml::NsReader;

use super::event::{NamespaceDecl, StartElement, XmlEvent};
use super::{Attribute, QName};
use crate::error::{SamlError, SamlResult};

/// Pull reader over an in-memory XML document.
///
/// Always begins with [`XmlEvent::StartDocument`] and ends with
/// [`XmlEvent::EndDocument`]; the iterator is fused after that or after the
/// first error.
pub struct EventReader<'a> {
    reader: NsReader<&'a [u8]>,
    pending: VecDeque<XmlEvent>,
    started: bool,
    done: bool,
}

impl<'a> EventReader<'a> {
    /// Creates a reader over `xml`.
    pub fn new(xml: &'a str) -> Self {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            pending: VecDeque::new(),
            started: false,
            done: false,
        }
    }

    /// Reads the next event.
    pub fn next_event(&mut self) -> SamlResult<XmlEvent> {
        if !self.started {
            self.started = true;
            return Ok(XmlEvent::StartDocument);
        }
        if let Some(event) = self.pending.pop_front() {
            return Ok(event);
        }
        loop {
            let (resolved, event) = self.reader.read_resolved_event()?;
            let namespace = owned_namespace(&resolved)?;
            let converted = match event {
                Event::Decl(_) => None,
                Event::Start(start) => Some(XmlEvent::StartElement(self.start_element(namespace, &start)?)),
                Event::Empty(start) => {
                    let start = self.start_element(namespace, &start)?;
                    self.pending.push_back(XmlEvent::EndElement(start.name.clone()));
                    Some(XmlEvent::StartElement(start))
                }
                Event::End(end) => {
                    let prefix = end.name().prefix().map(|p| utf8(p.as_ref())).transpose()?;
                    let local = utf8(end.local_name().as_ref())?;
                    let name = QName::new(namespace.as_deref(), local).with_prefix(prefix.as_deref());
                    Some(XmlEvent::EndElement(name))
                }
                Event::Text(text) => Some(XmlEvent::Characters(text.unescape()?.into_owned())),
                Event::CData(cdata) => Some(XmlEvent::Characters(utf8(&cdata.into_inner())?)),
                Event::Comment(comment) => Some(XmlEvent::Comment(utf8(&comment.into_inner())?)),
                Event::PI(pi) => Some(XmlEvent::ProcessingInstruction {
                    target: utf8(pi.target())?,
                    data: utf8(pi.content())?.trim_start().to_string(),
                }),
                Event::DocType(doctype) => Some(XmlEvent::Dtd(utf8(&doctype.into_inner())?)),
                Event::Eof => {
                    self.done = true;
                    Some(XmlEvent::EndDocument)
                }
            };
            if let Some(event) = converted {
                return Ok(event);
            }
        }
    }

    fn start_element(
        &self,
        namespace: Option<String>,
        start: &BytesStart<'_>,
    ) -> SamlResult<StartElement> {
        let prefix = start.name().prefix().map(|p| utf8(p.as_ref())).transpose()?;
        let local = utf8(start.local_name().as_ref())?;
        let mut element =
            StartElement::new(QName::new(namespace.as_deref(), local).with_prefix(prefix.as_deref()));

        for attr in start.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.into_owned();
            match attr.key.as_namespace_binding() {
                Some(PrefixDeclaration::Default) => {
                    element.namespaces.push(NamespaceDecl::new(None, value));
                }
                Some(PrefixDeclaration::Named(prefix)) => {
                    element.namespaces.push(NamespaceDecl::new(Some(&utf8(prefix)?), value));
                }
                None => element.attributes.push(self.attribute(&attr, value)?),
            }
        }
        Ok(element)
    }

    fn attribute(&self, attr: &RawAttribute<'_>, value: String) -> SamlResult<Attribute> {
        let (resolved, local) = self.reader.resolve_attribute(attr.key);
        let namespace = owned_namespace(&resolved)?;
        let prefix = attr.key.prefix().map(|p| utf8(p.as_ref())).transpose()?;
        let name = QName::new(namespace.as_deref(), utf8(local.as_ref())?).with_prefix(prefix.as_deref());
        Ok(Attribute::new(name, value))
    }
}

impl Iterator for EventReader<'_> {
    type Item = SamlResult<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done && self.pending.is_empty() {
            return None;
        }
        let event = self.next_event();
        if event.is_err() {
            self.done = true;
            self.pending.clear();
        }
        Some(event)
    }
}

/// Reads a whole document into an event list.
pub fn read_events(xml: &str) -> SamlResult<Vec<XmlEvent>> {
    EventReader::new(xml).collect()
}

fn owned_namespace(resolved: &ResolveResult<'_>) -> SamlResult<Option<String>> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())?)),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(SamlError::Parse(format!(
            "unbound namespace prefix '{}'",
            String::from_utf8_lossy(prefix)
        ))),
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| SamlError::Parse(format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::EventKind;

    #[test]
    fn reads_namespaced_elements_and_attributes() {
        let xml = r#"<?xml version="1.0"?><a:Root xmlns:a="urn:a" a:x="1" ID="r"><a:Child>t &amp; u</a:Child></a:Root>"#;
        let events = read_events(xml).unwrap();

        let kinds: Vec<_> = events.iter().map(XmlEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::StartDocument,
                EventKind::StartElement,
                EventKind::StartElement,
                EventKind::Characters,
                EventKind::EndElement,
                EventKind::EndElement,
                EventKind::EndDocument,
            ]
        );

        let XmlEvent::StartElement(root) = &events[1] else {
            panic!("expected start element");
        };
        assert!(root.name.is(Some("urn:a"), "Root"));
        assert_eq!(root.name.prefix(), Some("a"));
        assert_eq!(root.namespaces, vec![NamespaceDecl::new(Some("a"), "urn:a")]);
        assert_eq!(root.attributes.len(), 2);
        assert!(root.attributes[0].name.is(Some("urn:a"), "x"));
        assert!(root.attributes[1].name.is(None, "ID"));
        assert_eq!(events[3], XmlEvent::Characters("t & u".to_string()));
    }

    #[test]
    fn empty_elements_expand_to_start_and_end() {
        let events = read_events(r#"<r xmlns="urn:d"><e/></r>"#).unwrap();
        assert!(matches!(&events[2], XmlEvent::StartElement(s) if s.name.is(Some("urn:d"), "e")));
        assert!(matches!(&events[3], XmlEvent::EndElement(n) if n.is(Some("urn:d"), "e")));
    }

    #[test]
    fn reports_doctype_comment_and_pi() {
        let events = read_events("<!DOCTYPE r><?pi some data?><!--c--><r/>").unwrap();
        assert_eq!(events[1].kind(), EventKind::Dtd);
        assert_eq!(
            events[2],
            XmlEvent::ProcessingInstruction {
                target: "pi".to_string(),
                data: "some data".to_string()
            }
        );
        assert_eq!(events[3], XmlEvent::Comment("c".to_string()));
    }

    #[test]
    fn unbound_prefix_is_a_parse_error() {
        let err = read_events("<x:r/>").unwrap_err();
        assert!(matches!(err, SamlError::Parse(_)));
    }

    #[test]
    fn malformed_input_stops_iteration() {
        let mut reader = EventReader::new("<a><b></a>");
        let results: Vec<_> = reader.by_ref().collect();
        assert!(results.last().is_some_and(Result::is_err));
        assert!(reader.next().is_none());
    }
}
