//! Value types and XML helpers shared by both schema families.

use chrono::{DateTime, SecondsFormat, Utc};

use super::constants::DSIG_NS;
use crate::dom::Element;
use crate::error::{SamlError, SamlResult};

/// Subject name identifier (`NameIdentifier` in 1.x, `NameID` in 2.0).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameId {
    /// Identifier value.
    pub value: String,
    /// Format URI.
    pub format: Option<String>,
    /// Name qualifier.
    pub name_qualifier: Option<String>,
    /// SP name qualifier (2.0 only).
    pub sp_name_qualifier: Option<String>,
}

impl NameId {
    /// Creates a name identifier without qualifiers.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Sets the format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    /// Access permitted.
    Permit,
    /// Access denied.
    Deny,
    /// No decision.
    #[default]
    Indeterminate,
}

impl Decision {
    /// Returns the schema value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Permit => "Permit",
            Self::Deny => "Deny",
            Self::Indeterminate => "Indeterminate",
        }
    }

    /// Parses the schema value.
    pub fn parse(value: &str) -> SamlResult<Self> {
        match value {
            "Permit" => Ok(Self::Permit),
            "Deny" => Ok(Self::Deny),
            "Indeterminate" => Ok(Self::Indeterminate),
            other => Err(SamlError::Unmarshal(format!("unknown decision '{other}'"))),
        }
    }
}

/// Action in an authorization decision statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Action namespace.
    pub namespace: Option<String>,
    /// Action value.
    pub value: String,
}

/// Formats an instant the way SAML expects (UTC, millisecond precision).
pub(crate) fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SamlError::Unmarshal(format!("invalid instant '{value}': {e}")))
}

pub(crate) fn opt_instant(element: &Element, attr: &str) -> SamlResult<Option<DateTime<Utc>>> {
    element.attr(attr).map(parse_instant).transpose()
}

pub(crate) fn opt_string(element: &Element, attr: &str) -> Option<String> {
    element.attr(attr).map(str::to_string)
}

pub(crate) fn require_attr<'a>(element: &'a Element, attr: &str) -> SamlResult<&'a str> {
    element.attr(attr).ok_or_else(|| {
        SamlError::Unmarshal(format!(
            "<{}> is missing required attribute '{attr}'",
            element.local_name()
        ))
    })
}

/// Returns the first `ds:KeyInfo` child, if any.
pub(crate) fn key_info_child(element: &Element) -> Option<Element> {
    element.child(DSIG_NS, "KeyInfo").cloned()
}

/// Ensures an element carried over from another tree declares its own prefix.
///
/// Subtrees such as `ds:KeyInfo` often rely on a declaration made on an
/// ancestor that is not part of the copy.
pub(crate) fn with_own_namespace(mut element: Element) -> Element {
    let name = element.name().clone();
    if let Some(uri) = name.namespace() {
        let prefix = name.prefix();
        let declared = element.namespace_declarations().any(|(p, _)| p == prefix);
        if !declared {
            element.declare_namespace(prefix, uri);
        }
    }
    element
}
