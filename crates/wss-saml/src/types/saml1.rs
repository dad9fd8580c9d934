//! SAML 1.1 assertion model.
//!
//! SAML 1.x has no assertion-level subject: every statement carries its
//! own [`Subject`].

use chrono::{DateTime, Utc};

use super::common::{
    format_instant, key_info_child, opt_instant, opt_string, with_own_namespace, Action, Decision,
    NameId,
};
use super::constants::{DSIG_NS, SAML1_NS, SAML1_PREFIX};
use crate::dom::Element;
use crate::error::{SamlError, SamlResult};
use crate::signature::Signature;

/// SAML 1.1 `<saml:Assertion>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    /// `AssertionID`.
    pub id: Option<String>,
    /// `Issuer` attribute.
    pub issuer: Option<String>,
    /// `IssueInstant`.
    pub issue_instant: Option<DateTime<Utc>>,
    /// `MinorVersion` (`MajorVersion` is always 1).
    pub minor_version: u8,
    /// Validity conditions.
    pub conditions: Option<Conditions>,
    /// Generic subject statements.
    pub subject_statements: Vec<SubjectStatement>,
    /// Authentication statements.
    pub authentication_statements: Vec<AuthenticationStatement>,
    /// Attribute statements.
    pub attribute_statements: Vec<AttributeStatement>,
    /// Authorization decision statements.
    pub authorization_decision_statements: Vec<AuthorizationDecisionStatement>,
    /// Enveloped signature.
    pub signature: Option<Signature>,
    /// Set when the source element carried a signature.
    pub signed: bool,
}

impl Default for Assertion {
    fn default() -> Self {
        Self {
            id: None,
            issuer: None,
            issue_instant: None,
            minor_version: 1,
            conditions: None,
            subject_statements: Vec::new(),
            authentication_statements: Vec::new(),
            attribute_statements: Vec::new(),
            authorization_decision_statements: Vec::new(),
            signature: None,
            signed: false,
        }
    }
}

/// Statement subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    /// Name identifier.
    pub name_identifier: Option<NameId>,
    /// Confirmation.
    pub confirmation: Option<SubjectConfirmation>,
}

/// `<saml:SubjectConfirmation>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectConfirmation {
    /// `ConfirmationMethod` entries in order.
    pub methods: Vec<String>,
    /// Method carried inside `SubjectConfirmationData` by older producers.
    pub data_method: Option<String>,
    /// `ds:KeyInfo` subtree.
    pub key_info: Option<Element>,
}

/// `<saml:Conditions>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    /// `NotBefore`.
    pub not_before: Option<DateTime<Utc>>,
    /// `NotOnOrAfter`.
    pub not_on_or_after: Option<DateTime<Utc>>,
    /// Audiences of each `AudienceRestrictionCondition`.
    pub audience_restrictions: Vec<Vec<String>>,
}

/// `<saml:SubjectStatement>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectStatement {
    /// Subject.
    pub subject: Option<Subject>,
}

/// `<saml:AuthenticationStatement>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationStatement {
    /// Subject.
    pub subject: Option<Subject>,
    /// `AuthenticationMethod`.
    pub method: Option<String>,
    /// `AuthenticationInstant`.
    pub instant: Option<DateTime<Utc>>,
    /// `SubjectLocality/@IPAddress`.
    pub ip_address: Option<String>,
    /// `SubjectLocality/@DNSAddress`.
    pub dns_address: Option<String>,
}

/// `<saml:Attribute>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribute {
    /// `AttributeName`.
    pub name: String,
    /// `AttributeNamespace`.
    pub namespace: Option<String>,
    /// Values in order.
    pub values: Vec<String>,
}

/// `<saml:AttributeStatement>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeStatement {
    /// Subject.
    pub subject: Option<Subject>,
    /// Attributes.
    pub attributes: Vec<Attribute>,
}

/// `<saml:AuthorizationDecisionStatement>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationDecisionStatement {
    /// Subject.
    pub subject: Option<Subject>,
    /// `Resource`.
    pub resource: String,
    /// `Decision`.
    pub decision: Decision,
    /// Actions.
    pub actions: Vec<Action>,
}

fn saml(local: &str) -> Element {
    Element::new_ns(SAML1_NS, SAML1_PREFIX, local)
}

impl Assertion {
    /// Returns true if `element` is a SAML 1.x assertion root.
    pub fn is_root(element: &Element) -> bool {
        element.is(SAML1_NS, super::constants::ASSERTION)
    }

    /// Unmarshals a `<saml:Assertion>` element.
    pub fn unmarshal(element: &Element) -> SamlResult<Self> {
        if !Self::is_root(element) {
            return Err(SamlError::Unmarshal(format!(
                "not a SAML 1.x assertion: {}",
                element.name().qualified()
            )));
        }
        let minor_version = match element.attr("MinorVersion") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| SamlError::Unmarshal(format!("invalid MinorVersion '{v}'")))?,
            None => 1,
        };

        let mut assertion = Self {
            id: opt_string(element, "AssertionID").filter(|id| !id.is_empty()),
            issuer: opt_string(element, "Issuer"),
            issue_instant: opt_instant(element, "IssueInstant")?,
            minor_version,
            ..Self::default()
        };

        for child in element.child_elements() {
            if child.is(DSIG_NS, "Signature") {
                assertion.signature = Some(Signature::from_element(child)?);
                assertion.signed = true;
                continue;
            }
            if child.namespace() != Some(SAML1_NS) {
                continue;
            }
            match child.local_name() {
                "Conditions" => assertion.conditions = Some(Conditions::unmarshal(child)?),
                "SubjectStatement" => assertion.subject_statements.push(SubjectStatement {
                    subject: subject_of(child)?,
                }),
                "AuthenticationStatement" => assertion
                    .authentication_statements
                    .push(AuthenticationStatement::unmarshal(child)?),
                "AttributeStatement" => assertion
                    .attribute_statements
                    .push(AttributeStatement::unmarshal(child)?),
                "AuthorizationDecisionStatement" => assertion
                    .authorization_decision_statements
                    .push(AuthorizationDecisionStatement::unmarshal(child)?),
                _ => {}
            }
        }
        Ok(assertion)
    }

    /// Marshals to a `<saml:Assertion>` element.
    ///
    /// Child order: conditions, statements by category, signature.
    pub fn marshal(&self) -> Element {
        let mut root = saml("Assertion");
        root.declare_namespace(Some(SAML1_PREFIX), SAML1_NS);
        root.set_attr("MajorVersion", "1");
        root.set_attr("MinorVersion", self.minor_version.to_string());
        if let Some(id) = &self.id {
            root.set_attr("AssertionID", id.as_str());
        }
        if let Some(issuer) = &self.issuer {
            root.set_attr("Issuer", issuer.as_str());
        }
        if let Some(instant) = &self.issue_instant {
            root.set_attr("IssueInstant", format_instant(instant));
        }

        let mut root = root.with_opt_child(self.conditions.as_ref().map(Conditions::marshal));
        for statement in &self.subject_statements {
            root.append_element(
                saml("SubjectStatement").with_opt_child(statement.subject.as_ref().map(Subject::marshal)),
            );
        }
        for statement in &self.authentication_statements {
            root.append_element(statement.marshal());
        }
        for statement in &self.attribute_statements {
            root.append_element(statement.marshal());
        }
        for statement in &self.authorization_decision_statements {
            root.append_element(statement.marshal());
        }
        root.with_opt_child(self.signature.as_ref().map(Signature::to_element))
    }

    /// Returns the subject of every statement, in category order.
    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        let generic = self.subject_statements.iter().map(|s| s.subject.as_ref());
        let authn = self.authentication_statements.iter().map(|s| s.subject.as_ref());
        let attr = self.attribute_statements.iter().map(|s| s.subject.as_ref());
        let authz = self
            .authorization_decision_statements
            .iter()
            .map(|s| s.subject.as_ref());
        generic.chain(authn).chain(attr).chain(authz).flatten()
    }

    /// Collects confirmation methods across statement subjects.
    ///
    /// Per subject the legacy data method comes first, then the method list.
    pub fn confirmation_methods(&self) -> Vec<String> {
        let mut methods = Vec::new();
        for confirmation in self.subjects().filter_map(|s| s.confirmation.as_ref()) {
            methods.extend(confirmation.data_method.iter().cloned());
            methods.extend(confirmation.methods.iter().cloned());
        }
        methods
    }
}

fn subject_of(statement: &Element) -> SamlResult<Option<Subject>> {
    statement
        .child(SAML1_NS, "Subject")
        .map(Subject::unmarshal)
        .transpose()
}

impl Subject {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        let name_identifier = element.child(SAML1_NS, "NameIdentifier").map(|n| NameId {
            value: n.text().trim().to_string(),
            format: opt_string(n, "Format"),
            name_qualifier: opt_string(n, "NameQualifier"),
            sp_name_qualifier: None,
        });
        let confirmation = element
            .child(SAML1_NS, "SubjectConfirmation")
            .map(SubjectConfirmation::unmarshal);
        Ok(Self {
            name_identifier,
            confirmation,
        })
    }

    /// Marshals to a `<saml:Subject>` element.
    pub fn marshal(&self) -> Element {
        let name = self.name_identifier.as_ref().map(|n| {
            saml("NameIdentifier")
                .with_opt_attr("Format", n.format.as_deref())
                .with_opt_attr("NameQualifier", n.name_qualifier.as_deref())
                .with_text(n.value.as_str())
        });
        saml("Subject")
            .with_opt_child(name)
            .with_opt_child(self.confirmation.as_ref().map(SubjectConfirmation::marshal))
    }
}

impl SubjectConfirmation {
    fn unmarshal(element: &Element) -> Self {
        let methods = element
            .children_named(SAML1_NS, "ConfirmationMethod")
            .map(|m| m.text().trim().to_string())
            .collect();
        let data_method = element
            .child(SAML1_NS, "SubjectConfirmationData")
            .and_then(|d| d.child_text(SAML1_NS, "ConfirmationMethod"));
        Self {
            methods,
            data_method,
            key_info: key_info_child(element),
        }
    }

    fn marshal(&self) -> Element {
        let mut element = saml("SubjectConfirmation");
        for method in &self.methods {
            element.append_element(saml("ConfirmationMethod").with_text(method.as_str()));
        }
        let data = self.data_method.as_ref().map(|method| {
            saml("SubjectConfirmationData")
                .with_child(saml("ConfirmationMethod").with_text(method.as_str()))
        });
        element
            .with_opt_child(data)
            .with_opt_child(self.key_info.clone().map(with_own_namespace))
    }
}

impl Conditions {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        let audience_restrictions = element
            .children_named(SAML1_NS, "AudienceRestrictionCondition")
            .map(|r| {
                r.children_named(SAML1_NS, "Audience")
                    .map(|a| a.text().trim().to_string())
                    .collect()
            })
            .collect();
        Ok(Self {
            not_before: opt_instant(element, "NotBefore")?,
            not_on_or_after: opt_instant(element, "NotOnOrAfter")?,
            audience_restrictions,
        })
    }

    fn marshal(&self) -> Element {
        let mut element = saml("Conditions")
            .with_opt_attr("NotBefore", self.not_before.as_ref().map(format_instant))
            .with_opt_attr("NotOnOrAfter", self.not_on_or_after.as_ref().map(format_instant));
        for audiences in &self.audience_restrictions {
            let restriction = audiences
                .iter()
                .fold(saml("AudienceRestrictionCondition"), |acc, a| {
                    acc.with_child(saml("Audience").with_text(a.as_str()))
                });
            element.append_element(restriction);
        }
        element
    }
}

impl AuthenticationStatement {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        let locality = element.child(SAML1_NS, "SubjectLocality");
        Ok(Self {
            subject: subject_of(element)?,
            method: opt_string(element, "AuthenticationMethod"),
            instant: opt_instant(element, "AuthenticationInstant")?,
            ip_address: locality.and_then(|l| opt_string(l, "IPAddress")),
            dns_address: locality.and_then(|l| opt_string(l, "DNSAddress")),
        })
    }

    fn marshal(&self) -> Element {
        let locality = (self.ip_address.is_some() || self.dns_address.is_some()).then(|| {
            saml("SubjectLocality")
                .with_opt_attr("IPAddress", self.ip_address.as_deref())
                .with_opt_attr("DNSAddress", self.dns_address.as_deref())
        });
        saml("AuthenticationStatement")
            .with_opt_attr("AuthenticationMethod", self.method.as_deref())
            .with_opt_attr("AuthenticationInstant", self.instant.as_ref().map(format_instant))
            .with_opt_child(self.subject.as_ref().map(Subject::marshal))
            .with_opt_child(locality)
    }
}

impl AttributeStatement {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        let attributes = element
            .children_named(SAML1_NS, "Attribute")
            .map(|a| Attribute {
                name: a.attr("AttributeName").unwrap_or_default().to_string(),
                namespace: opt_string(a, "AttributeNamespace"),
                values: a
                    .children_named(SAML1_NS, "AttributeValue")
                    .map(Element::text)
                    .collect(),
            })
            .collect();
        Ok(Self {
            subject: subject_of(element)?,
            attributes,
        })
    }

    fn marshal(&self) -> Element {
        let mut element =
            saml("AttributeStatement").with_opt_child(self.subject.as_ref().map(Subject::marshal));
        for attribute in &self.attributes {
            let attr = attribute.values.iter().fold(
                saml("Attribute")
                    .with_attr("AttributeName", attribute.name.as_str())
                    .with_opt_attr("AttributeNamespace", attribute.namespace.as_deref()),
                |acc, v| acc.with_child(saml("AttributeValue").with_text(v.as_str())),
            );
            element.append_element(attr);
        }
        element
    }
}

impl AuthorizationDecisionStatement {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        let actions = element
            .children_named(SAML1_NS, "Action")
            .map(|a| Action {
                namespace: opt_string(a, "Namespace"),
                value: a.text().trim().to_string(),
            })
            .collect();
        Ok(Self {
            subject: subject_of(element)?,
            resource: element.attr("Resource").unwrap_or_default().to_string(),
            decision: element
                .attr("Decision")
                .map(Decision::parse)
                .transpose()?
                .unwrap_or_default(),
            actions,
        })
    }

    fn marshal(&self) -> Element {
        let mut element = saml("AuthorizationDecisionStatement")
            .with_attr("Resource", self.resource.as_str())
            .with_attr("Decision", self.decision.as_str())
            .with_opt_child(self.subject.as_ref().map(Subject::marshal));
        for action in &self.actions {
            element.append_element(
                saml("Action")
                    .with_opt_attr("Namespace", action.namespace.as_deref())
                    .with_text(action.value.as_str()),
            );
        }
        element
    }
}
