//! SAML 2.0 assertion model.

use chrono::{DateTime, Utc};

use super::common::{
    format_instant, opt_instant, opt_string, with_own_namespace, Action, Decision, NameId,
};
use super::constants::{DSIG_NS, SAML2_NS, SAML2_PREFIX};
use crate::dom::Element;
use crate::error::{SamlError, SamlResult};
use crate::signature::Signature;

/// SAML 2.0 `<saml2:Assertion>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assertion {
    /// `ID`.
    pub id: Option<String>,
    /// `IssueInstant`.
    pub issue_instant: Option<DateTime<Utc>>,
    /// `Issuer` element.
    pub issuer: Option<Issuer>,
    /// Subject.
    pub subject: Option<Subject>,
    /// Validity conditions.
    pub conditions: Option<Conditions>,
    /// Authentication statements.
    pub authn_statements: Vec<AuthnStatement>,
    /// Attribute statements.
    pub attribute_statements: Vec<AttributeStatement>,
    /// Authorization decision statements.
    pub authz_decision_statements: Vec<AuthzDecisionStatement>,
    /// Enveloped signature.
    pub signature: Option<Signature>,
    /// Set when the source element carried a signature.
    pub signed: bool,
}

/// `<saml2:Issuer>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Issuer {
    /// Issuer value.
    pub value: String,
    /// `Format`.
    pub format: Option<String>,
}

/// `<saml2:Subject>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    /// `NameID`.
    pub name_id: Option<NameId>,
    /// Confirmations in declaration order.
    pub confirmations: Vec<SubjectConfirmation>,
}

/// `<saml2:SubjectConfirmation>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectConfirmation {
    /// `Method`.
    pub method: String,
    /// `SubjectConfirmationData`.
    pub data: Option<SubjectConfirmationData>,
}

/// `<saml2:SubjectConfirmationData>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectConfirmationData {
    /// `NotBefore`.
    pub not_before: Option<DateTime<Utc>>,
    /// `NotOnOrAfter`.
    pub not_on_or_after: Option<DateTime<Utc>>,
    /// `Recipient`.
    pub recipient: Option<String>,
    /// `InResponseTo`.
    pub in_response_to: Option<String>,
    /// `Address`.
    pub address: Option<String>,
    /// `ds:KeyInfo` children (holder-of-key).
    pub key_infos: Vec<Element>,
}

/// `<saml2:Conditions>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    /// `NotBefore`.
    pub not_before: Option<DateTime<Utc>>,
    /// `NotOnOrAfter`.
    pub not_on_or_after: Option<DateTime<Utc>>,
    /// Audiences of each `AudienceRestriction`.
    pub audience_restrictions: Vec<Vec<String>>,
    /// `OneTimeUse` present.
    pub one_time_use: bool,
}

/// `<saml2:AuthnStatement>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthnStatement {
    /// `AuthnInstant`.
    pub authn_instant: Option<DateTime<Utc>>,
    /// `SessionIndex`.
    pub session_index: Option<String>,
    /// `SessionNotOnOrAfter`.
    pub session_not_on_or_after: Option<DateTime<Utc>>,
    /// `AuthnContext/AuthnContextClassRef`.
    pub context_class_ref: Option<String>,
    /// `SubjectLocality/@Address`.
    pub locality_address: Option<String>,
    /// `SubjectLocality/@DNSName`.
    pub locality_dns_name: Option<String>,
}

/// `<saml2:Attribute>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribute {
    /// `Name`.
    pub name: String,
    /// `NameFormat`.
    pub name_format: Option<String>,
    /// `FriendlyName`.
    pub friendly_name: Option<String>,
    /// Values in order.
    pub values: Vec<String>,
}

/// `<saml2:AttributeStatement>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeStatement {
    /// Attributes.
    pub attributes: Vec<Attribute>,
}

/// `<saml2:AuthzDecisionStatement>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthzDecisionStatement {
    /// `Resource`.
    pub resource: String,
    /// `Decision`.
    pub decision: Decision,
    /// Actions.
    pub actions: Vec<Action>,
}

fn saml2(local: &str) -> Element {
    Element::new_ns(SAML2_NS, SAML2_PREFIX, local)
}

impl Assertion {
    /// Returns true if `element` is a SAML 2.0 assertion root.
    pub fn is_root(element: &Element) -> bool {
        element.is(SAML2_NS, super::constants::ASSERTION)
    }

    /// Unmarshals a `<saml2:Assertion>` element.
    pub fn unmarshal(element: &Element) -> SamlResult<Self> {
        if !Self::is_root(element) {
            return Err(SamlError::Unmarshal(format!(
                "not a SAML 2.0 assertion: {}",
                element.name().qualified()
            )));
        }
        if let Some(version) = element.attr("Version").filter(|v| *v != "2.0") {
            return Err(SamlError::Unmarshal(format!("unsupported Version '{version}'")));
        }

        let mut assertion = Self {
            id: opt_string(element, "ID").filter(|id| !id.is_empty()),
            issue_instant: opt_instant(element, "IssueInstant")?,
            ..Self::default()
        };

        for child in element.child_elements() {
            if child.is(DSIG_NS, "Signature") {
                assertion.signature = Some(Signature::from_element(child)?);
                assertion.signed = true;
                continue;
            }
            if child.namespace() != Some(SAML2_NS) {
                continue;
            }
            match child.local_name() {
                "Issuer" => {
                    assertion.issuer = Some(Issuer {
                        value: child.text().trim().to_string(),
                        format: opt_string(child, "Format"),
                    });
                }
                "Subject" => assertion.subject = Some(Subject::unmarshal(child)?),
                "Conditions" => assertion.conditions = Some(Conditions::unmarshal(child)?),
                "AuthnStatement" => assertion.authn_statements.push(AuthnStatement::unmarshal(child)?),
                "AttributeStatement" => assertion
                    .attribute_statements
                    .push(AttributeStatement::unmarshal(child)),
                "AuthzDecisionStatement" => assertion
                    .authz_decision_statements
                    .push(AuthzDecisionStatement::unmarshal(child)?),
                _ => {}
            }
        }
        Ok(assertion)
    }

    /// Marshals to a `<saml2:Assertion>` element.
    ///
    /// Child order follows the schema: issuer, signature, subject,
    /// conditions, then statements by category.
    pub fn marshal(&self) -> Element {
        let mut root = saml2("Assertion");
        root.declare_namespace(Some(SAML2_PREFIX), SAML2_NS);
        root.set_attr("Version", "2.0");
        if let Some(id) = &self.id {
            root.set_attr("ID", id.as_str());
        }
        if let Some(instant) = &self.issue_instant {
            root.set_attr("IssueInstant", format_instant(instant));
        }
        let issuer = self.issuer.as_ref().map(|i| {
            saml2("Issuer")
                .with_opt_attr("Format", i.format.as_deref())
                .with_text(i.value.as_str())
        });

        let mut root = root
            .with_opt_child(issuer)
            .with_opt_child(self.signature.as_ref().map(Signature::to_element))
            .with_opt_child(self.subject.as_ref().map(Subject::marshal))
            .with_opt_child(self.conditions.as_ref().map(Conditions::marshal));
        for statement in &self.authn_statements {
            root.append_element(statement.marshal());
        }
        for statement in &self.attribute_statements {
            root.append_element(statement.marshal());
        }
        for statement in &self.authz_decision_statements {
            root.append_element(statement.marshal());
        }
        root
    }

    /// Returns the issuer value.
    pub fn issuer_value(&self) -> Option<&str> {
        self.issuer.as_ref().map(|i| i.value.as_str())
    }

    /// Collects each subject confirmation's method in declaration order.
    pub fn confirmation_methods(&self) -> Vec<String> {
        self.subject
            .iter()
            .flat_map(|s| s.confirmations.iter())
            .map(|c| c.method.clone())
            .collect()
    }
}

impl Subject {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        let name_id = element.child(SAML2_NS, "NameID").map(|n| NameId {
            value: n.text().trim().to_string(),
            format: opt_string(n, "Format"),
            name_qualifier: opt_string(n, "NameQualifier"),
            sp_name_qualifier: opt_string(n, "SPNameQualifier"),
        });
        let confirmations = element
            .children_named(SAML2_NS, "SubjectConfirmation")
            .map(SubjectConfirmation::unmarshal)
            .collect::<SamlResult<Vec<_>>>()?;
        Ok(Self {
            name_id,
            confirmations,
        })
    }

    fn marshal(&self) -> Element {
        let name_id = self.name_id.as_ref().map(|n| {
            saml2("NameID")
                .with_opt_attr("Format", n.format.as_deref())
                .with_opt_attr("NameQualifier", n.name_qualifier.as_deref())
                .with_opt_attr("SPNameQualifier", n.sp_name_qualifier.as_deref())
                .with_text(n.value.as_str())
        });
        let mut element = saml2("Subject").with_opt_child(name_id);
        for confirmation in &self.confirmations {
            element.append_element(confirmation.marshal());
        }
        element
    }
}

impl SubjectConfirmation {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        let data = element
            .child(SAML2_NS, "SubjectConfirmationData")
            .map(|d| {
                Ok::<_, SamlError>(SubjectConfirmationData {
                    not_before: opt_instant(d, "NotBefore")?,
                    not_on_or_after: opt_instant(d, "NotOnOrAfter")?,
                    recipient: opt_string(d, "Recipient"),
                    in_response_to: opt_string(d, "InResponseTo"),
                    address: opt_string(d, "Address"),
                    key_infos: d.children_named(DSIG_NS, "KeyInfo").cloned().collect(),
                })
            })
            .transpose()?;
        Ok(Self {
            method: element.attr("Method").unwrap_or_default().to_string(),
            data,
        })
    }

    fn marshal(&self) -> Element {
        let data = self.data.as_ref().map(|d| {
            let mut data = saml2("SubjectConfirmationData")
                .with_opt_attr("NotBefore", d.not_before.as_ref().map(format_instant))
                .with_opt_attr("NotOnOrAfter", d.not_on_or_after.as_ref().map(format_instant))
                .with_opt_attr("Recipient", d.recipient.as_deref())
                .with_opt_attr("InResponseTo", d.in_response_to.as_deref())
                .with_opt_attr("Address", d.address.as_deref());
            for key_info in &d.key_infos {
                data.append_element(with_own_namespace(key_info.clone()));
            }
            data
        });
        saml2("SubjectConfirmation")
            .with_attr("Method", self.method.as_str())
            .with_opt_child(data)
    }
}

impl Conditions {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        Ok(Self {
            not_before: opt_instant(element, "NotBefore")?,
            not_on_or_after: opt_instant(element, "NotOnOrAfter")?,
            audience_restrictions: element
                .children_named(SAML2_NS, "AudienceRestriction")
                .map(|r| {
                    r.children_named(SAML2_NS, "Audience")
                        .map(|a| a.text().trim().to_string())
                        .collect()
                })
                .collect(),
            one_time_use: element.child(SAML2_NS, "OneTimeUse").is_some(),
        })
    }

    fn marshal(&self) -> Element {
        let mut element = saml2("Conditions")
            .with_opt_attr("NotBefore", self.not_before.as_ref().map(format_instant))
            .with_opt_attr("NotOnOrAfter", self.not_on_or_after.as_ref().map(format_instant));
        for audiences in &self.audience_restrictions {
            element.append_element(audiences.iter().fold(saml2("AudienceRestriction"), |acc, a| {
                acc.with_child(saml2("Audience").with_text(a.as_str()))
            }));
        }
        if self.one_time_use {
            element.append_element(saml2("OneTimeUse"));
        }
        element
    }
}

impl AuthnStatement {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        let locality = element.child(SAML2_NS, "SubjectLocality");
        Ok(Self {
            authn_instant: opt_instant(element, "AuthnInstant")?,
            session_index: opt_string(element, "SessionIndex"),
            session_not_on_or_after: opt_instant(element, "SessionNotOnOrAfter")?,
            context_class_ref: element
                .child(SAML2_NS, "AuthnContext")
                .and_then(|c| c.child_text(SAML2_NS, "AuthnContextClassRef")),
            locality_address: locality.and_then(|l| opt_string(l, "Address")),
            locality_dns_name: locality.and_then(|l| opt_string(l, "DNSName")),
        })
    }

    fn marshal(&self) -> Element {
        let locality = (self.locality_address.is_some() || self.locality_dns_name.is_some())
            .then(|| {
                saml2("SubjectLocality")
                    .with_opt_attr("Address", self.locality_address.as_deref())
                    .with_opt_attr("DNSName", self.locality_dns_name.as_deref())
            });
        let context = self.context_class_ref.as_ref().map(|c| {
            saml2("AuthnContext").with_child(saml2("AuthnContextClassRef").with_text(c.as_str()))
        });
        saml2("AuthnStatement")
            .with_opt_attr("AuthnInstant", self.authn_instant.as_ref().map(format_instant))
            .with_opt_attr("SessionIndex", self.session_index.as_deref())
            .with_opt_attr(
                "SessionNotOnOrAfter",
                self.session_not_on_or_after.as_ref().map(format_instant),
            )
            .with_opt_child(locality)
            .with_opt_child(context)
    }
}

impl AttributeStatement {
    fn unmarshal(element: &Element) -> Self {
        let attributes = element
            .children_named(SAML2_NS, "Attribute")
            .map(|a| Attribute {
                name: a.attr("Name").unwrap_or_default().to_string(),
                name_format: opt_string(a, "NameFormat"),
                friendly_name: opt_string(a, "FriendlyName"),
                values: a
                    .children_named(SAML2_NS, "AttributeValue")
                    .map(Element::text)
                    .collect(),
            })
            .collect();
        Self { attributes }
    }

    fn marshal(&self) -> Element {
        let mut element = saml2("AttributeStatement");
        for attribute in &self.attributes {
            element.append_element(attribute.values.iter().fold(
                saml2("Attribute")
                    .with_attr("Name", attribute.name.as_str())
                    .with_opt_attr("NameFormat", attribute.name_format.as_deref())
                    .with_opt_attr("FriendlyName", attribute.friendly_name.as_deref()),
                |acc, v| acc.with_child(saml2("AttributeValue").with_text(v.as_str())),
            ));
        }
        element
    }
}

impl AuthzDecisionStatement {
    fn unmarshal(element: &Element) -> SamlResult<Self> {
        Ok(Self {
            resource: element.attr("Resource").unwrap_or_default().to_string(),
            decision: element
                .attr("Decision")
                .map(Decision::parse)
                .transpose()?
                .unwrap_or_default(),
            actions: element
                .children_named(SAML2_NS, "Action")
                .map(|a| Action {
                    namespace: opt_string(a, "Namespace"),
                    value: a.text().trim().to_string(),
                })
                .collect(),
        })
    }

    fn marshal(&self) -> Element {
        let mut element = saml2("AuthzDecisionStatement")
            .with_attr("Resource", self.resource.as_str())
            .with_attr("Decision", self.decision.as_str());
        for action in &self.actions {
            element.append_element(
                saml2("Action")
                    .with_opt_attr("Namespace", action.namespace.as_deref())
                    .with_text(action.value.as_str()),
            );
        }
        element
    }
}
