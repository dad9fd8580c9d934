//! Version-abstracted assertion.
//!
//! [`SamlAssertion`] wraps either a SAML 1.1 or a SAML 2.0 assertion and
//! answers the questions token processing asks of both: identifier, issuer,
//! confirmation methods and signature state.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use wss_crypto::KeyInfo;

use super::bean::{AssertionParams, SamlCallback};
use super::builder::{new_assertion_id, saml1_assertion, saml2_assertion};
use super::{saml1, saml2};
use crate::dom::{Document, Element, Node};
use crate::engine::{saml_engine, SamlEngine};
use crate::error::{SamlError, SamlResult};
use crate::signature::Signature;

/// Supported SAML versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlVersion {
    /// SAML 1.1.
    V1_1,
    /// SAML 2.0.
    V2_0,
}

impl SamlVersion {
    /// Returns the version string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V1_1 => "1.1",
            Self::V2_0 => "2.0",
        }
    }
}

impl FromStr for SamlVersion {
    type Err = SamlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.1" => Ok(Self::V1_1),
            "2.0" => Ok(Self::V2_0),
            other => Err(SamlError::VersionIndeterminate(format!(
                "unsupported SAML version '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SamlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Objects that can carry an enveloped signature.
pub trait Signable {
    /// Returns the attached signature.
    fn signature(&self) -> Option<&Signature>;

    /// Attaches a signature.
    fn set_signature(&mut self, signature: Signature);

    /// Returns true if the object was read from a signed element.
    fn signed_flag(&self) -> bool;

    /// Returns true if a signature is attached or the signed flag is set.
    fn is_signed(&self) -> bool {
        self.signed_flag() || self.signature().is_some()
    }
}

/// Objects that can be written as an element tree.
pub trait Marshalable {
    /// Builds the element form.
    fn marshal(&self) -> Element;
}

/// Capabilities shared by both assertion schema families.
pub trait VersionedAssertion: Signable + Marshalable {
    /// Schema version.
    fn version(&self) -> SamlVersion;

    /// Assertion identifier, if set.
    fn id(&self) -> Option<&str>;

    /// Replaces the identifier.
    fn set_id(&mut self, id: String);

    /// Issuer value.
    fn issuer(&self) -> Option<&str>;

    /// Subject confirmation methods in declaration order.
    fn confirmation_methods(&self) -> Vec<String>;
}

impl Signable for saml1::Assertion {
    fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, signature: Signature) {
        self.signature = Some(signature);
    }

    fn signed_flag(&self) -> bool {
        self.signed
    }
}

impl Marshalable for saml1::Assertion {
    fn marshal(&self) -> Element {
        saml1::Assertion::marshal(self)
    }
}

impl VersionedAssertion for saml1::Assertion {
    fn version(&self) -> SamlVersion {
        SamlVersion::V1_1
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    fn confirmation_methods(&self) -> Vec<String> {
        saml1::Assertion::confirmation_methods(self)
    }
}

impl Signable for saml2::Assertion {
    fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, signature: Signature) {
        self.signature = Some(signature);
    }

    fn signed_flag(&self) -> bool {
        self.signed
    }
}

impl Marshalable for saml2::Assertion {
    fn marshal(&self) -> Element {
        saml2::Assertion::marshal(self)
    }
}

impl VersionedAssertion for saml2::Assertion {
    fn version(&self) -> SamlVersion {
        SamlVersion::V2_0
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn issuer(&self) -> Option<&str> {
        self.issuer_value()
    }

    fn confirmation_methods(&self) -> Vec<String> {
        saml2::Assertion::confirmation_methods(self)
    }
}

/// The assertion in one of the two schema families.
#[derive(Debug, Clone, PartialEq)]
pub enum AssertionModel {
    /// SAML 1.1.
    Saml1(Box<saml1::Assertion>),
    /// SAML 2.0.
    Saml2(Box<saml2::Assertion>),
}

impl AssertionModel {
    fn inner(&self) -> &dyn VersionedAssertion {
        match self {
            Self::Saml1(a) => &**a,
            Self::Saml2(a) => &**a,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn VersionedAssertion {
        match self {
            Self::Saml1(a) => &mut **a,
            Self::Saml2(a) => &mut **a,
        }
    }
}

/// A SAML assertion of either version plus the key material resolved for it.
#[derive(Clone)]
pub struct SamlAssertion {
    model: AssertionModel,
    element: Option<Element>,
    signature_key_info: Option<Arc<KeyInfo>>,
    subject_key_info: Option<Arc<KeyInfo>>,
}

impl SamlAssertion {
    /// Parses an assertion element using the process-wide engine.
    pub fn parse(element: &Element) -> SamlResult<Self> {
        saml_engine()?.unmarshal(element)
    }

    /// Parses an assertion element with an explicit engine.
    pub fn parse_with(engine: &SamlEngine, element: &Element) -> SamlResult<Self> {
        engine.unmarshal(element)
    }

    /// Parses an XML string holding a single assertion.
    pub fn parse_str(xml: &str) -> SamlResult<Self> {
        let engine = saml_engine()?;
        let document = engine.parse_document(xml)?;
        let element = document
            .document_element()
            .ok_or_else(|| SamlError::Parse("document has no element".to_string()))?;
        engine.unmarshal(element)
    }

    /// Wraps a parsed model and the element it came from.
    pub(crate) fn from_parsed(model: AssertionModel, element: Element) -> Self {
        Self {
            model,
            element: Some(element),
            signature_key_info: None,
            subject_key_info: None,
        }
    }

    /// Wraps an in-memory model.
    pub fn from_model(model: AssertionModel) -> Self {
        Self {
            model,
            element: None,
            signature_key_info: None,
            subject_key_info: None,
        }
    }

    /// Assembles an assertion from statement descriptors.
    ///
    /// 1.1 children are ordered conditions, authentication, attribute,
    /// authorization decision; 2.0 children are ordered issuer, subject,
    /// conditions, authentication, attribute, authorization decision.
    pub fn build(version: SamlVersion, issuer: &str, callback: &SamlCallback) -> SamlResult<Self> {
        let now = Utc::now();
        let model = match version {
            SamlVersion::V1_1 => AssertionModel::Saml1(Box::new(saml1_assertion(issuer, callback, now)?)),
            SamlVersion::V2_0 => AssertionModel::Saml2(Box::new(saml2_assertion(issuer, callback, now)?)),
        };
        debug!(%version, issuer, "built SAML assertion");
        Ok(Self::from_model(model))
    }

    /// Runs the callback handler and builds the assertion it describes.
    pub fn from_params(params: &AssertionParams<'_>) -> SamlResult<Self> {
        let version: SamlVersion = params.version.parse()?;
        let mut callback = SamlCallback::default();
        params.handler.handle(&mut callback)?;
        Self::build(version, params.issuer, &callback)
    }

    /// Returns the schema version.
    pub fn version(&self) -> SamlVersion {
        self.model.inner().version()
    }

    /// Returns the tagged model.
    pub fn model(&self) -> &AssertionModel {
        &self.model
    }

    /// Returns the SAML 1.1 form, if this is one.
    pub fn saml1(&self) -> Option<&saml1::Assertion> {
        match &self.model {
            AssertionModel::Saml1(a) => Some(a),
            AssertionModel::Saml2(_) => None,
        }
    }

    /// Returns the SAML 2.0 form, if this is one.
    pub fn saml2(&self) -> Option<&saml2::Assertion> {
        match &self.model {
            AssertionModel::Saml2(a) => Some(a),
            AssertionModel::Saml1(_) => None,
        }
    }

    /// Returns the identifier without assigning one.
    pub fn id(&self) -> Option<&str> {
        self.model.inner().id()
    }

    /// Returns the identifier, assigning a fresh one first if it is missing.
    ///
    /// Assignment happens at most once; the cached source element is
    /// released because it no longer matches the model.
    pub fn ensure_id(&mut self) -> &str {
        if self.model.inner().id().is_none() {
            let id = new_assertion_id();
            warn!(%id, "assertion has no ID, assigning a new one");
            self.model.inner_mut().set_id(id);
            self.element = None;
        }
        self.model.inner().id().unwrap_or_default()
    }

    /// Returns the issuer value.
    pub fn issuer_string(&self) -> Option<&str> {
        let issuer = self.model.inner().issuer();
        if issuer.is_none() {
            warn!(version = %self.version(), "assertion has no issuer");
        }
        issuer
    }

    /// Returns subject confirmation methods in declaration order.
    pub fn confirmation_methods(&self) -> Vec<String> {
        self.model.inner().confirmation_methods()
    }

    /// Returns true if the assertion is signed.
    pub fn is_signed(&self) -> bool {
        self.model.inner().is_signed()
    }

    /// Returns the attached signature.
    pub fn signature(&self) -> Option<&Signature> {
        self.model.inner().signature()
    }

    /// Attaches a signature to the model and releases the cached element.
    pub fn set_signature(&mut self, signature: Signature) {
        self.model.inner_mut().set_signature(signature);
        self.element = None;
    }

    /// Attaches a signature together with the signed element it belongs to.
    pub(crate) fn set_signed(&mut self, signature: Signature, element: Element) {
        self.model.inner_mut().set_signature(signature);
        self.element = Some(element);
    }

    /// Returns the element this assertion was parsed from or signed as.
    pub fn element(&self) -> Option<&Element> {
        self.element.as_ref()
    }

    /// Returns the element a signature check runs against: the cached
    /// source element, or a fresh marshal of the model.
    pub(crate) fn signed_element(&self) -> Cow<'_, Element> {
        match &self.element {
            Some(element) => Cow::Borrowed(element),
            None => Cow::Owned(self.model.inner().marshal()),
        }
    }

    /// Returns the element form.
    ///
    /// A cached source element is returned as is so signatures stay valid.
    /// When `document` is given the element is marshalled as that
    /// document's root and then detached again; the document keeps exactly
    /// the top-level nodes it had before the call.
    pub fn to_element(&mut self, document: Option<&mut Document>) -> Element {
        self.ensure_id();
        let element = match &self.element {
            Some(element) => element.clone(),
            None => self.model.inner().marshal(),
        };
        let Some(document) = document else {
            return element;
        };

        let saved = document.take_children();
        document.append(Node::Element(element));
        let element = document.take_children().into_iter().find_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        });
        document.restore_children(saved);
        element.unwrap_or_else(|| self.model.inner().marshal())
    }

    /// Serializes the element form.
    pub fn to_xml_string(&mut self) -> String {
        self.to_element(None).to_xml_string()
    }

    /// Returns the key material that verified the signature.
    pub fn signature_key_info(&self) -> Option<&Arc<KeyInfo>> {
        self.signature_key_info.as_ref()
    }

    pub(crate) fn set_signature_key_info(&mut self, key_info: Arc<KeyInfo>) {
        self.signature_key_info = Some(key_info);
    }

    /// Returns the holder-of-key subject key material.
    pub fn subject_key_info(&self) -> Option<&Arc<KeyInfo>> {
        self.subject_key_info.as_ref()
    }

    pub(crate) fn set_subject_key_info(&mut self, key_info: Arc<KeyInfo>) {
        self.subject_key_info = Some(key_info);
    }
}

impl fmt::Debug for SamlAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamlAssertion")
            .field("version", &self.version())
            .field("id", &self.id())
            .field("issuer", &self.model.inner().issuer())
            .field("signed", &self.is_signed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::bean::{
        AttributeBean, AttributeStatementBean, AuthDecisionStatementBean,
        AuthenticationStatementBean, ConditionsBean, SubjectBean,
    };
    use crate::types::common::Decision;
    use crate::types::constants::confirmation_methods::{
        SAML1_SENDER_VOUCHES, SAML2_SENDER_VOUCHES,
    };
    use crate::types::constants::{SAML1_NS, SAML2_NS};

    fn callback(method: &str) -> SamlCallback {
        SamlCallback {
            subject: Some(SubjectBean::new("alice", method)),
            authentication_statements: vec![AuthenticationStatementBean::default()],
            attribute_statements: vec![
                AttributeStatementBean {
                    subject: None,
                    attributes: vec![AttributeBean::new("email", vec!["a@example.org".to_string()])],
                },
                AttributeStatementBean::default(),
            ],
            auth_decision_statements: vec![AuthDecisionStatementBean {
                resource: "/orders".to_string(),
                decision: Decision::Permit,
                ..Default::default()
            }],
            conditions: Some(ConditionsBean {
                token_period_minutes: Some(5),
                ..Default::default()
            }),
        }
    }

    fn counts(assertion: &SamlAssertion) -> (usize, usize, usize) {
        match assertion.model() {
            AssertionModel::Saml1(a) => (
                a.authentication_statements.len(),
                a.attribute_statements.len(),
                a.authorization_decision_statements.len(),
            ),
            AssertionModel::Saml2(a) => (
                a.authn_statements.len(),
                a.attribute_statements.len(),
                a.authz_decision_statements.len(),
            ),
        }
    }

    #[test]
    fn version_strings() {
        assert_eq!("1.1".parse::<SamlVersion>().unwrap(), SamlVersion::V1_1);
        assert_eq!("2.0".parse::<SamlVersion>().unwrap(), SamlVersion::V2_0);
        assert!(matches!(
            "3.0".parse::<SamlVersion>(),
            Err(SamlError::VersionIndeterminate(_))
        ));
        assert_eq!(SamlVersion::V2_0.to_string(), "2.0");
    }

    #[test]
    fn build_marshal_parse_round_trip() {
        for (version, method) in [
            (SamlVersion::V1_1, SAML1_SENDER_VOUCHES),
            (SamlVersion::V2_0, SAML2_SENDER_VOUCHES),
        ] {
            let mut built = SamlAssertion::build(version, "https://idp.example.org", &callback(method)).unwrap();
            let element = built.to_element(None);
            let parsed = SamlAssertion::parse(&element).unwrap();

            assert_eq!(parsed.version(), version);
            assert_eq!(parsed.id(), built.id());
            assert_eq!(parsed.issuer_string(), Some("https://idp.example.org"));
            assert_eq!(counts(&parsed), counts(&built));
            assert_eq!(counts(&parsed), (1, 2, 1));
            assert_eq!(parsed.element(), Some(&element));
        }
    }

    #[test]
    fn ensure_id_assigns_once() {
        let xml = format!(r#"<saml2:Assertion xmlns:saml2="{SAML2_NS}" Version="2.0"><saml2:Issuer>idp</saml2:Issuer></saml2:Assertion>"#);
        let mut assertion = SamlAssertion::parse_str(&xml).unwrap();
        assert_eq!(assertion.id(), None);

        let first = assertion.ensure_id().to_string();
        assert!(!first.is_empty());
        assert!(assertion.element().is_none());
        assert_eq!(assertion.ensure_id(), first);
        assert_eq!(assertion.id(), Some(first.as_str()));
    }

    #[test]
    fn empty_id_counts_as_missing() {
        let xml = format!(r#"<saml:Assertion xmlns:saml="{SAML1_NS}" MajorVersion="1" MinorVersion="1" AssertionID="" Issuer="idp"/>"#);
        let mut assertion = SamlAssertion::parse_str(&xml).unwrap();
        assert!(assertion.ensure_id().starts_with("_id"));
    }

    #[test]
    fn missing_issuer_is_none() {
        let xml = format!(r#"<saml2:Assertion xmlns:saml2="{SAML2_NS}" ID="_a"/>"#);
        let assertion = SamlAssertion::parse_str(&xml).unwrap();
        assert_eq!(assertion.issuer_string(), None);
        assert!(assertion.confirmation_methods().is_empty());
        assert!(!assertion.is_signed());
    }

    #[test]
    fn to_element_leaves_document_nodes_in_place() {
        let mut document = Document::parse_str("<!--keep--><Envelope><Header/></Envelope>").unwrap();
        let before = document.clone();

        let mut assertion = SamlAssertion::build(SamlVersion::V2_0, "idp", &SamlCallback::default()).unwrap();
        let element = assertion.to_element(Some(&mut document));

        assert!(element.is(SAML2_NS, "Assertion"));
        assert_eq!(document, before);
    }

    #[test]
    fn from_params_runs_handler() {
        let handler = |cb: &mut SamlCallback| {
            *cb = callback(SAML2_SENDER_VOUCHES);
            Ok::<(), SamlError>(())
        };
        let params = AssertionParams {
            version: "2.0",
            issuer: "idp",
            handler: &handler,
        };
        let assertion = SamlAssertion::from_params(&params).unwrap();
        assert_eq!(assertion.confirmation_methods(), vec![SAML2_SENDER_VOUCHES]);

        let bad = AssertionParams { version: "1.0", ..params };
        assert!(matches!(
            SamlAssertion::from_params(&bad),
            Err(SamlError::VersionIndeterminate(_))
        ));
    }

    #[test]
    fn to_xml_string_is_parseable() {
        let mut assertion = SamlAssertion::build(SamlVersion::V1_1, "idp", &callback(SAML1_SENDER_VOUCHES)).unwrap();
        let xml = assertion.to_xml_string();
        let parsed = SamlAssertion::parse_str(&xml).unwrap();
        assert_eq!(parsed.confirmation_methods(), vec![SAML1_SENDER_VOUCHES; 4]);
    }
}
