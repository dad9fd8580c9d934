//! Statement descriptors for the build path.
//!
//! An application fills a [`SamlCallback`] with these beans from its
//! [`SamlCallbackHandler`]; [`SamlAssertion::build`](crate::SamlAssertion::build)
//! turns them into a version-specific assertion.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use wss_crypto::{Certificate, PublicKey};

use super::common::Decision;
use super::constants::{DSIG11_NS, DSIG_NS, DSIG_PREFIX};
use crate::dom::Element;
use crate::error::{SamlError, SamlResult};

/// Subject descriptor.
#[derive(Debug, Clone, Default)]
pub struct SubjectBean {
    /// Subject name.
    pub name: String,
    /// Name qualifier.
    pub name_qualifier: Option<String>,
    /// Name format URI.
    pub name_format: Option<String>,
    /// Confirmation method URI.
    pub confirmation_method: Option<String>,
    /// Key material for holder-of-key confirmation.
    pub key_info: Option<KeyInfoBean>,
}

impl SubjectBean {
    /// Creates a subject with a confirmation method.
    pub fn new(name: impl Into<String>, confirmation_method: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            confirmation_method: Some(confirmation_method.into()),
            ..Self::default()
        }
    }

    /// Attaches key material.
    #[must_use]
    pub fn with_key_info(mut self, key_info: KeyInfoBean) -> Self {
        self.key_info = Some(key_info);
        self
    }
}

/// How a certificate is referenced in a generated `ds:KeyInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertIdentifier {
    /// Embed the certificate.
    #[default]
    X509Certificate,
    /// Reference it by issuer name and serial number.
    X509IssuerSerial,
}

/// Key material descriptor, marshalled to `ds:KeyInfo`.
#[derive(Debug, Clone, Default)]
pub struct KeyInfoBean {
    /// Certificate.
    pub certificate: Option<Certificate>,
    /// Certificate reference style.
    pub cert_identifier: CertIdentifier,
    /// Bare public key, written as `dsig11:DEREncodedKeyValue`.
    pub public_key: Option<PublicKey>,
    /// Key name.
    pub key_name: Option<String>,
}

impl KeyInfoBean {
    /// Embeds a certificate.
    pub fn from_certificate(certificate: Certificate) -> Self {
        Self {
            certificate: Some(certificate),
            ..Self::default()
        }
    }

    /// Carries a bare public key.
    pub fn from_public_key(public_key: PublicKey) -> Self {
        Self {
            public_key: Some(public_key),
            ..Self::default()
        }
    }

    /// References a key by name.
    pub fn from_key_name(name: impl Into<String>) -> Self {
        Self {
            key_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the certificate reference style.
    #[must_use]
    pub fn with_cert_identifier(mut self, identifier: CertIdentifier) -> Self {
        self.cert_identifier = identifier;
        self
    }

    /// Marshals to a `ds:KeyInfo` element.
    pub fn to_element(&self) -> SamlResult<Element> {
        if self.certificate.is_none() && self.public_key.is_none() && self.key_name.is_none() {
            return Err(SamlError::Marshal(
                "KeyInfoBean carries no key material".to_string(),
            ));
        }
        let ds = |local: &str| Element::new_ns(DSIG_NS, DSIG_PREFIX, local);
        let mut key_info = ds("KeyInfo");
        key_info.declare_namespace(Some(DSIG_PREFIX), DSIG_NS);

        if let Some(name) = &self.key_name {
            key_info.append_element(ds("KeyName").with_text(name.as_str()));
        }
        if let Some(cert) = &self.certificate {
            let data = match self.cert_identifier {
                CertIdentifier::X509Certificate => ds("X509Certificate").with_text(cert.to_base64()),
                CertIdentifier::X509IssuerSerial => ds("X509IssuerSerial")
                    .with_child(ds("X509IssuerName").with_text(cert.issuer()))
                    .with_child(ds("X509SerialNumber").with_text(cert.serial())),
            };
            key_info.append_element(ds("X509Data").with_child(data));
        }
        if let Some(key) = &self.public_key {
            let mut value = Element::new_ns(DSIG11_NS, "dsig11", "DEREncodedKeyValue");
            value.declare_namespace(Some("dsig11"), DSIG11_NS);
            key_info.append_element(
                value.with_text(crate::signature::encode_base64(key.spki_der())),
            );
        }
        Ok(key_info)
    }
}

/// Conditions descriptor.
#[derive(Debug, Clone, Default)]
pub struct ConditionsBean {
    /// Start of validity.
    pub not_before: Option<DateTime<Utc>>,
    /// End of validity.
    pub not_after: Option<DateTime<Utc>>,
    /// Validity from now in minutes, used when no explicit bounds are set.
    pub token_period_minutes: Option<i64>,
    /// Audience URIs.
    pub audience_uris: Vec<String>,
}

impl ConditionsBean {
    /// Returns `(not_before, not_on_or_after)` resolved against `now`.
    pub fn validity(&self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        if self.not_before.is_some() || self.not_after.is_some() {
            return (self.not_before, self.not_after);
        }
        match self.token_period_minutes {
            Some(minutes) => (Some(now), Some(now + Duration::minutes(minutes))),
            None => (None, None),
        }
    }
}

/// Authentication statement descriptor.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationStatementBean {
    /// Statement subject (1.1 only; 2.0 uses the assertion subject).
    pub subject: Option<SubjectBean>,
    /// Authentication method / context class URI.
    pub authentication_method: Option<String>,
    /// Authentication instant; defaults to build time.
    pub authentication_instant: Option<DateTime<Utc>>,
    /// Session index (2.0 only).
    pub session_index: Option<String>,
    /// Subject IP address.
    pub subject_locality_ip: Option<String>,
    /// Subject DNS name.
    pub subject_locality_dns: Option<String>,
}

/// One attribute with its values.
#[derive(Debug, Clone, Default)]
pub struct AttributeBean {
    /// Attribute name (`Name` / `AttributeName`).
    pub name: String,
    /// Name format (2.0) or attribute namespace (1.1).
    pub name_format: Option<String>,
    /// Friendly name (2.0 only).
    pub friendly_name: Option<String>,
    /// Values.
    pub values: Vec<String>,
}

impl AttributeBean {
    /// Creates an attribute.
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
            ..Self::default()
        }
    }
}

/// Attribute statement descriptor.
#[derive(Debug, Clone, Default)]
pub struct AttributeStatementBean {
    /// Statement subject (1.1 only).
    pub subject: Option<SubjectBean>,
    /// Attributes.
    pub attributes: Vec<AttributeBean>,
}

/// Action descriptor.
#[derive(Debug, Clone, Default)]
pub struct ActionBean {
    /// Action namespace.
    pub namespace: Option<String>,
    /// Action value.
    pub contents: String,
}

/// Authorization decision statement descriptor.
#[derive(Debug, Clone, Default)]
pub struct AuthDecisionStatementBean {
    /// Statement subject (1.1 only).
    pub subject: Option<SubjectBean>,
    /// Resource URI.
    pub resource: String,
    /// Decision.
    pub decision: Decision,
    /// Actions.
    pub actions: Vec<ActionBean>,
}

/// Data collected from the application for one assertion.
#[derive(Debug, Clone, Default)]
pub struct SamlCallback {
    /// Assertion subject; also the default statement subject for 1.1.
    pub subject: Option<SubjectBean>,
    /// Authentication statements.
    pub authentication_statements: Vec<AuthenticationStatementBean>,
    /// Attribute statements.
    pub attribute_statements: Vec<AttributeStatementBean>,
    /// Authorization decision statements.
    pub auth_decision_statements: Vec<AuthDecisionStatementBean>,
    /// Conditions.
    pub conditions: Option<ConditionsBean>,
}

/// Application hook that supplies assertion content.
pub trait SamlCallbackHandler: Send + Sync {
    /// Fills `callback`.
    fn handle(&self, callback: &mut SamlCallback) -> SamlResult<()>;
}

impl<F> SamlCallbackHandler for F
where
    F: Fn(&mut SamlCallback) -> SamlResult<()> + Send + Sync,
{
    fn handle(&self, callback: &mut SamlCallback) -> SamlResult<()> {
        self(callback)
    }
}

/// Build-path parameters.
pub struct AssertionParams<'a> {
    /// `"1.1"` or `"2.0"`.
    pub version: &'a str,
    /// Issuer value.
    pub issuer: &'a str,
    /// Content supplier.
    pub handler: &'a dyn SamlCallbackHandler,
}

impl fmt::Debug for AssertionParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionParams")
            .field("version", &self.version)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_key_info_bean_is_rejected() {
        let err = KeyInfoBean::default().to_element().unwrap_err();
        assert!(matches!(err, SamlError::Marshal(_)));
    }

    #[test]
    fn key_name_bean_marshals() {
        let element = KeyInfoBean::from_key_name("alice").to_element().unwrap();
        assert!(element.is(DSIG_NS, "KeyInfo"));
        assert_eq!(element.child_text(DSIG_NS, "KeyName").as_deref(), Some("alice"));
    }

    #[test]
    fn conditions_validity() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let period = ConditionsBean {
            token_period_minutes: Some(5),
            ..Default::default()
        };
        assert_eq!(period.validity(now), (Some(now), Some(now + Duration::minutes(5))));

        let explicit = ConditionsBean {
            not_after: Some(now),
            token_period_minutes: Some(5),
            ..Default::default()
        };
        assert_eq!(explicit.validity(now), (None, Some(now)));
        assert_eq!(ConditionsBean::default().validity(now), (None, None));
    }

    #[test]
    fn closures_are_handlers() {
        let handler = |cb: &mut SamlCallback| {
            cb.subject = Some(SubjectBean::new("alice", "urn:cm"));
            Ok::<(), SamlError>(())
        };
        let mut callback = SamlCallback::default();
        handler.handle(&mut callback).unwrap();
        assert_eq!(callback.subject.unwrap().name, "alice");
    }
}
