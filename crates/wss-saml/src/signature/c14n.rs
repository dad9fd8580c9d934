//! XML canonicalization over the crate's DOM.
//!
//! The element handed in is canonicalized as the apex of the output node
//! set. Namespaces declared on ancestors outside that element come in
//! through a [`C14nContext`]: inclusive C14N renders all of them on the
//! apex, exclusive C14N only the ones visibly used or named in the
//! `InclusiveNamespaces` prefix list.

use std::collections::{BTreeMap, BTreeSet};

use crate::dom::{Element, Node};
use crate::error::{SamlError, SamlResult};
use crate::types::constants::canonicalization_algorithms::{
    EXCLUSIVE_C14N, EXCLUSIVE_C14N_WITH_COMMENTS, INCLUSIVE_C14N, INCLUSIVE_C14N_WITH_COMMENTS,
};

use super::Canonicalizer;

const XML_PREFIX: &str = "xml";
const DEFAULT_PREFIX_TOKEN: &str = "#default";

/// Namespace context of the apex element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct C14nContext {
    /// Declarations in scope from ancestors of the apex, prefix to URI.
    /// The default namespace is keyed by the empty string.
    pub inherited: BTreeMap<String, String>,
    /// `InclusiveNamespaces/@PrefixList` entries for exclusive C14N;
    /// `#default` names the default namespace.
    pub inclusive_prefixes: Vec<String>,
}

impl C14nContext {
    /// Collects the declarations of `ancestors`, outermost first; inner
    /// declarations override outer ones.
    pub fn inherited_from<'a>(ancestors: impl IntoIterator<Item = &'a Element>) -> Self {
        let mut inherited = BTreeMap::new();
        for ancestor in ancestors {
            for (prefix, uri) in ancestor.namespace_declarations() {
                inherited.insert(prefix.unwrap_or_default().to_string(), uri.to_string());
            }
        }
        Self {
            inherited,
            inclusive_prefixes: Vec::new(),
        }
    }

    /// Sets the exclusive C14N prefix list.
    #[must_use]
    pub fn with_inclusive_prefixes(mut self, prefixes: &[String]) -> Self {
        self.inclusive_prefixes = prefixes.to_vec();
        self
    }

    fn prefix_set(&self) -> BTreeSet<String> {
        self.inclusive_prefixes
            .iter()
            .map(|p| if p == DEFAULT_PREFIX_TOKEN { String::new() } else { p.clone() })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Mode {
    exclusive: bool,
    comments: bool,
}

impl Mode {
    fn from_uri(uri: &str) -> SamlResult<Self> {
        let (exclusive, comments) = match uri {
            EXCLUSIVE_C14N => (true, false),
            EXCLUSIVE_C14N_WITH_COMMENTS => (true, true),
            INCLUSIVE_C14N => (false, false),
            INCLUSIVE_C14N_WITH_COMMENTS => (false, true),
            other => {
                return Err(SamlError::SignatureVerification(format!(
                    "unsupported canonicalization algorithm: {other}"
                )));
            }
        };
        Ok(Self { exclusive, comments })
    }
}

/// Canonical XML 1.0 and Exclusive XML Canonicalization 1.0, with and
/// without comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCanonicalizer;

impl Canonicalizer for XmlCanonicalizer {
    fn canonicalize_in_context(
        &self,
        element: &Element,
        algorithm: &str,
        context: &C14nContext,
    ) -> SamlResult<Vec<u8>> {
        let mode = Mode::from_uri(algorithm)?;
        let inclusive = context.prefix_set();
        let mut out = String::new();
        write_element(
            element,
            mode,
            &inclusive,
            &BTreeMap::new(),
            &context.inherited,
            &mut out,
        );
        Ok(out.into_bytes())
    }
}

/// `rendered` holds the namespace nodes already emitted by output
/// ancestors; `in_scope` holds every declaration seen so far.
fn write_element(
    element: &Element,
    mode: Mode,
    inclusive: &BTreeSet<String>,
    rendered: &BTreeMap<String, String>,
    in_scope: &BTreeMap<String, String>,
    out: &mut String,
) {
    let mut scope = in_scope.clone();
    for (prefix, uri) in element.namespace_declarations() {
        scope.insert(prefix.unwrap_or_default().to_string(), uri.to_string());
    }

    let name = element.name();
    let element_prefix = name.prefix().unwrap_or_default();
    let mut needed: BTreeMap<String, String> = BTreeMap::new();
    needed.insert(
        element_prefix.to_string(),
        name.namespace().unwrap_or_default().to_string(),
    );

    let mut attributes: Vec<_> = element
        .attributes()
        .iter()
        .filter(|a| !a.is_namespace_declaration())
        .collect();
    for attr in &attributes {
        if let (Some(prefix), Some(ns)) = (attr.name.prefix(), attr.name.namespace()) {
            if prefix != XML_PREFIX {
                needed.insert(prefix.to_string(), ns.to_string());
            }
        }
    }
    for (prefix, uri) in &scope {
        if !mode.exclusive || inclusive.contains(prefix) {
            needed.entry(prefix.clone()).or_insert_with(|| uri.clone());
        }
    }

    let mut now_rendered = rendered.clone();
    let mut declarations = Vec::new();
    for (prefix, uri) in needed {
        let previous = rendered.get(&prefix).map(String::as_str);
        let redundant = if prefix.is_empty() && uri.is_empty() {
            previous.map_or(true, str::is_empty)
        } else {
            previous == Some(uri.as_str())
        };
        if !redundant {
            declarations.push((prefix.clone(), uri.clone()));
            now_rendered.insert(prefix, uri);
        }
    }

    attributes.sort_by(|a, b| {
        (a.name.namespace().unwrap_or_default(), a.name.local_name())
            .cmp(&(b.name.namespace().unwrap_or_default(), b.name.local_name()))
    });

    let qualified = name.qualified();
    out.push('<');
    out.push_str(&qualified);
    for (prefix, uri) in &declarations {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attribute(uri, out);
        out.push('"');
    }
    for attr in attributes {
        out.push(' ');
        out.push_str(&attr.name.qualified());
        out.push_str("=\"");
        escape_attribute(&attr.value, out);
        out.push('"');
    }
    out.push('>');

    for child in element.children() {
        match child {
            Node::Element(e) => write_element(e, mode, inclusive, &now_rendered, &scope, out),
            Node::Text(text) => escape_text(text, out),
            Node::Comment(comment) if mode.comments => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Comment(_) => {}
            Node::ProcessingInstruction { target, data } => {
                out.push_str("<?");
                out.push_str(target);
                if !data.is_empty() {
                    out.push(' ');
                    out.push_str(data);
                }
                out.push_str("?>");
            }
        }
    }

    out.push_str("</");
    out.push_str(&qualified);
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}
