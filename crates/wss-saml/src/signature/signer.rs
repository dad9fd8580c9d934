//! Enveloped signature creation for assertions.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use wss_crypto::{digest, Certificate, DigestAlgorithm, SigningKey};

use crate::error::SamlResult;
use crate::types::constants::canonicalization_algorithms::EXCLUSIVE_C14N;
use crate::types::constants::transforms::ENVELOPED_SIGNATURE;
use crate::types::constants::{DSIG_NS, SAML2_NS};
use crate::types::{KeyInfoBean, SamlAssertion, SamlVersion};

use super::engine::transform_octets;
use super::{
    signature_envelope, C14nContext, Canonicalizer, Reference, Signature, SignedInfo,
    XmlCanonicalizer,
};

/// Signs assertions with an enveloped signature.
///
/// The reference is transformed with exclusive C14N; `SignedInfo` is
/// canonicalized with exclusive C14N unless configured otherwise. The
/// signature references the assertion by ID and sits after the `Issuer`
/// in SAML 2.0 and as the last child in SAML 1.1. When a certificate is
/// configured it is embedded as `ds:X509Certificate`.
pub struct AssertionSigner {
    key: SigningKey,
    certificate: Option<Certificate>,
    canonicalizer: Arc<dyn Canonicalizer>,
    canonicalization_method: String,
    inclusive_prefixes: Vec<String>,
    digest: DigestAlgorithm,
}

impl AssertionSigner {
    /// Creates a signer for `key`; the digest follows the key's algorithm.
    pub fn new(key: SigningKey) -> Self {
        let digest = key.algorithm().digest();
        Self {
            key,
            certificate: None,
            canonicalizer: Arc::new(XmlCanonicalizer),
            canonicalization_method: EXCLUSIVE_C14N.to_string(),
            inclusive_prefixes: Vec::new(),
            digest,
        }
    }

    /// Embeds `certificate` in the signature's key info.
    #[must_use]
    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Uses a different canonicalizer.
    #[must_use]
    pub fn with_canonicalizer(mut self, canonicalizer: Arc<dyn Canonicalizer>) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Canonicalizes `SignedInfo` with `algorithm`.
    #[must_use]
    pub fn with_canonicalization_method(mut self, algorithm: impl Into<String>) -> Self {
        self.canonicalization_method = algorithm.into();
        self
    }

    /// Lists prefixes the reference's exclusive C14N treats inclusively.
    #[must_use]
    pub fn with_inclusive_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.inclusive_prefixes = prefixes;
        self
    }

    /// Signs `assertion` in place.
    ///
    /// Assigns an ID first if the assertion has none. Any previous
    /// signature is replaced.
    pub fn sign(&self, assertion: &mut SamlAssertion) -> SamlResult<()> {
        let id = assertion.ensure_id().to_string();
        let mut element = assertion.to_element(None);
        element.remove_children(DSIG_NS, "Signature");

        let transforms = vec![ENVELOPED_SIGNATURE.to_string(), EXCLUSIVE_C14N.to_string()];
        let octets = transform_octets(
            self.canonicalizer.as_ref(),
            &element,
            &transforms,
            &self.inclusive_prefixes,
        )?;
        let signed_info = SignedInfo {
            canonicalization_method: self.canonicalization_method.clone(),
            inclusive_prefixes: Vec::new(),
            signature_method: self.key.algorithm().uri().to_string(),
            references: vec![Reference {
                uri: Some(format!("#{id}")),
                transforms,
                inclusive_prefixes: self.inclusive_prefixes.clone(),
                digest_method: self.digest.uri().to_string(),
                digest_value: digest(self.digest, &octets),
            }],
        };

        let envelope = signature_envelope();
        let context = C14nContext::inherited_from([&element, &envelope]);
        let canonical = self.canonicalizer.canonicalize_in_context(
            &signed_info.to_element(),
            &self.canonicalization_method,
            &context,
        )?;
        let value = self.key.sign(&canonical)?;
        let key_info = self
            .certificate
            .as_ref()
            .map(|cert| KeyInfoBean::from_certificate(cert.clone()).to_element())
            .transpose()?;
        let signature = Signature::new(signed_info, value, key_info);

        match assertion.version() {
            SamlVersion::V2_0 => element.insert_after(SAML2_NS, "Issuer", signature.to_element()),
            SamlVersion::V1_1 => element.append_element(signature.to_element()),
        }
        debug!(%id, algorithm = self.key.algorithm().uri(), "assertion signed");
        assertion.set_signed(signature, element);
        Ok(())
    }
}

impl fmt::Debug for AssertionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionSigner")
            .field("key", &self.key)
            .field("certificate", &self.certificate)
            .field("canonicalization_method", &self.canonicalization_method)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{SignatureEngine, XmlDsigEngine};
    use crate::types::constants::canonicalization_algorithms::INCLUSIVE_C14N;
    use crate::types::constants::confirmation_methods::{SAML1_SENDER_VOUCHES, SAML2_BEARER};
    use crate::types::{SamlCallback, SubjectBean};
    use wss_crypto::{Credential, SignatureAlgorithm};

    fn signer() -> (AssertionSigner, Certificate) {
        let certified = rcgen::generate_simple_self_signed(vec!["idp".to_string()]).unwrap();
        let key = SigningKey::from_pkcs8(
            &certified.key_pair.serialize_der(),
            SignatureAlgorithm::EcdsaSha256,
        )
        .unwrap();
        let cert = Certificate::from_der(certified.cert.der()).unwrap();
        (AssertionSigner::new(key).with_certificate(cert.clone()), cert)
    }

    fn assertion(version: SamlVersion, method: &str) -> SamlAssertion {
        let callback = SamlCallback {
            subject: Some(SubjectBean::new("alice", method)),
            ..SamlCallback::default()
        };
        SamlAssertion::build(version, "https://idp.example.org", &callback).unwrap()
    }

    #[test]
    fn signs_saml2_after_issuer() {
        let (signer, cert) = signer();
        let mut assertion = assertion(SamlVersion::V2_0, SAML2_BEARER);
        signer.sign(&mut assertion).unwrap();

        assert!(assertion.is_signed());
        let element = assertion.element().unwrap();
        let names: Vec<_> = element.child_elements().map(|e| e.local_name()).collect();
        assert_eq!(&names[..2], &["Issuer", "Signature"]);

        let signature = assertion.signature().unwrap();
        let id = assertion.id().unwrap();
        assert_eq!(
            signature.signed_info().references[0].uri.as_deref(),
            Some(format!("#{id}").as_str())
        );
        XmlDsigEngine::default()
            .verify(element, signature, &Credential::Certificate(cert))
            .unwrap();
    }

    #[test]
    fn signs_saml1_as_last_child() {
        let (signer, cert) = signer();
        let mut assertion = assertion(SamlVersion::V1_1, SAML1_SENDER_VOUCHES);
        signer.sign(&mut assertion).unwrap();

        let element = assertion.element().unwrap();
        assert_eq!(
            element.child_elements().last().map(|e| e.local_name()),
            Some("Signature")
        );
        XmlDsigEngine::default()
            .verify(element, assertion.signature().unwrap(), &Credential::Certificate(cert))
            .unwrap();
    }

    #[test]
    fn signature_survives_serialization() {
        let (signer, cert) = signer();
        let mut assertion = assertion(SamlVersion::V2_0, SAML2_BEARER);
        signer.sign(&mut assertion).unwrap();

        let parsed = SamlAssertion::parse_str(&assertion.to_xml_string()).unwrap();
        assert!(parsed.is_signed());
        XmlDsigEngine::default()
            .verify(
                parsed.element().unwrap(),
                parsed.signature().unwrap(),
                &Credential::Certificate(cert),
            )
            .unwrap();
    }

    #[test]
    fn inclusive_signed_info_verifies_with_assertion_namespaces() {
        let (signer, cert) = signer();
        let signer = signer.with_canonicalization_method(INCLUSIVE_C14N);
        let mut assertion = assertion(SamlVersion::V2_0, SAML2_BEARER);
        signer.sign(&mut assertion).unwrap();

        let signature = assertion.signature().unwrap();
        assert_eq!(signature.signed_info().canonicalization_method, INCLUSIVE_C14N);
        let credential = Credential::Certificate(cert);
        XmlDsigEngine::default()
            .verify(assertion.element().unwrap(), signature, &credential)
            .unwrap();

        let parsed = SamlAssertion::parse_str(&assertion.to_xml_string()).unwrap();
        XmlDsigEngine::default()
            .verify(parsed.element().unwrap(), parsed.signature().unwrap(), &credential)
            .unwrap();
    }

    #[test]
    fn prefix_list_signature_survives_serialization() {
        let (signer, cert) = signer();
        let signer = signer.with_inclusive_prefixes(vec!["xs".to_string()]);
        let mut assertion = assertion(SamlVersion::V2_0, SAML2_BEARER);
        signer.sign(&mut assertion).unwrap();

        let parsed = SamlAssertion::parse_str(&assertion.to_xml_string()).unwrap();
        let signature = parsed.signature().unwrap();
        assert_eq!(signature.signed_info().references[0].inclusive_prefixes, vec!["xs"]);
        XmlDsigEngine::default()
            .verify(parsed.element().unwrap(), signature, &Credential::Certificate(cert))
            .unwrap();
    }

    #[test]
    fn resigning_replaces_signature() {
        let (signer, _) = signer();
        let mut assertion = assertion(SamlVersion::V2_0, SAML2_BEARER);
        signer.sign(&mut assertion).unwrap();
        signer.sign(&mut assertion).unwrap();
        let count = assertion
            .element()
            .unwrap()
            .children_named(DSIG_NS, "Signature")
            .count();
        assert_eq!(count, 1);
    }
}
