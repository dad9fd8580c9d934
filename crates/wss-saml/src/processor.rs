//! SAML token processing for WS-Security headers.
//!
//! Each assertion goes through the same pipeline: build the DOM, parse,
//! verify the signature if there is one, check signer trust, resolve a
//! holder-of-key subject key, then register a [`SecurityToken`] and emit a
//! [`SecurityEvent`].

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use wss_crypto::{KeyCallback, TrustStore};

use crate::dom::{Element, NamespaceDecl, XmlEvent};
use crate::engine::SamlEngine;
use crate::error::{SamlError, SamlResult};
use crate::signature::{SignatureTrustVerifier, XmlDsigEngine};
use crate::subject::SubjectConfirmationResolver;
use crate::token::{SecurityContext, SecurityEvent, SecurityToken};
use crate::types::constants::{SECURITY, WSSE_NS};
use crate::types::SamlAssertion;

/// Processes SAML assertions found in a security header.
pub struct SamlTokenProcessor {
    engine: Arc<SamlEngine>,
    verifier: SignatureTrustVerifier,
    subject_resolver: SubjectConfirmationResolver,
    trust_store: Arc<dyn TrustStore>,
    key_callback: Option<Arc<dyn KeyCallback>>,
}

impl SamlTokenProcessor {
    /// Creates a processor with the default verification stages. SHA-1
    /// acceptance follows the engine configuration.
    pub fn new(engine: Arc<SamlEngine>, trust_store: Arc<dyn TrustStore>) -> Self {
        let dsig = XmlDsigEngine::default().allow_sha1(engine.config().allow_sha1);
        Self {
            engine,
            verifier: SignatureTrustVerifier::with_engine(Arc::new(dsig)),
            subject_resolver: SubjectConfirmationResolver::default(),
            trust_store,
            key_callback: None,
        }
    }

    /// Replaces the signature verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: SignatureTrustVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replaces the subject confirmation resolver.
    #[must_use]
    pub fn with_subject_resolver(mut self, resolver: SubjectConfirmationResolver) -> Self {
        self.subject_resolver = resolver;
        self
    }

    /// Sets the callback that supplies secret subject keys by name.
    #[must_use]
    pub fn with_key_callback(mut self, callback: Arc<dyn KeyCallback>) -> Self {
        self.key_callback = Some(callback);
        self
    }

    /// Processes an assertion element and registers its token.
    pub fn process_element(
        &self,
        element: &Element,
        context: &mut dyn SecurityContext,
    ) -> SamlResult<SamlAssertion> {
        let assertion = self.engine.unmarshal(element)?;
        self.process_assertion(assertion, context)
    }

    /// Builds one assertion from the front of `events` and processes it.
    ///
    /// Events after the assertion's end tag stay in the iterator.
    pub fn process_events<I>(
        &self,
        events: &mut I,
        context: &mut dyn SecurityContext,
    ) -> SamlResult<SamlAssertion>
    where
        I: Iterator<Item = XmlEvent>,
    {
        let element = self.engine.dom_builder().build_subtree(events)?;
        self.process_element(&element, context)
    }

    /// Processes every assertion in a header event stream, in order.
    ///
    /// Only assertions that are direct children of a `wsse:Security`
    /// element count; assertions anywhere else, such as in the SOAP body,
    /// are skipped. Returns the registered token IDs. Processing stops at
    /// the first failing assertion; tokens registered before it stay
    /// registered. Namespace declarations inherited from enclosing
    /// elements are copied onto each assertion root.
    pub fn process_header<I>(
        &self,
        events: I,
        context: &mut dyn SecurityContext,
    ) -> SamlResult<Vec<String>>
    where
        I: IntoIterator<Item = XmlEvent>,
    {
        let mut events = events.into_iter();
        let mut scopes: Vec<Vec<NamespaceDecl>> = Vec::new();
        let mut security_depth: Option<usize> = None;
        let mut token_ids = Vec::new();

        while let Some(event) = events.next() {
            match event {
                XmlEvent::StartElement(mut start) => {
                    let is_assertion = self.engine.version_of_name(&start.name).is_some();
                    if !is_assertion || security_depth != Some(scopes.len()) {
                        if is_assertion {
                            debug!(depth = scopes.len(), "skipping assertion outside wsse:Security");
                        }
                        if security_depth.is_none() && start.name.is(Some(WSSE_NS), SECURITY) {
                            security_depth = Some(scopes.len() + 1);
                        }
                        scopes.push(start.namespaces);
                        continue;
                    }
                    for inherited in scopes.iter().rev().flatten() {
                        if !start.namespaces.iter().any(|d| d.prefix == inherited.prefix) {
                            start.namespaces.push(inherited.clone());
                        }
                    }
                    let mut subtree =
                        std::iter::once(XmlEvent::StartElement(start)).chain(events.by_ref());
                    let assertion = self.process_events(&mut subtree, context)?;
                    token_ids.push(assertion.id().unwrap_or_default().to_string());
                }
                XmlEvent::EndElement(_) => {
                    if security_depth == Some(scopes.len()) {
                        security_depth = None;
                    }
                    scopes.pop();
                }
                _ => {}
            }
        }
        Ok(token_ids)
    }

    /// Parses `xml` and processes every assertion in it.
    pub fn process_header_str(
        &self,
        xml: &str,
        context: &mut dyn SecurityContext,
    ) -> SamlResult<Vec<String>> {
        let events = crate::dom::read_events(xml)?;
        self.process_header(events, context)
    }

    fn process_assertion(
        &self,
        mut assertion: SamlAssertion,
        context: &mut dyn SecurityContext,
    ) -> SamlResult<SamlAssertion> {
        let config = self.engine.config();
        let trust_store = self.trust_store.as_ref();

        if assertion.is_signed() {
            let key_info = self.verifier.verify_signature(&mut assertion, trust_store)?;
            if config.validate_signature_trust {
                self.verifier.verify_signed_assertion(&key_info, trust_store)?;
            }
        } else if config.require_signed_assertions {
            return Err(SamlError::UnsignedAssertion(
                assertion.id().unwrap_or("<no id>").to_string(),
            ));
        } else {
            debug!(id = assertion.id(), "assertion is not signed");
        }

        self.subject_resolver.resolve_holder_of_key(
            &mut assertion,
            trust_store,
            self.key_callback.as_deref(),
        )?;

        let token = SecurityToken::from_assertion(&mut assertion, Arc::clone(&self.trust_store));
        let event = SecurityEvent::SamlToken {
            issuer: token.issuer().map(str::to_string),
            version: token.version(),
            token_id: token.id().to_string(),
        };
        debug!(id = token.id(), issuer = token.issuer(), "registering SAML token");
        context.register_token(token)?;
        context.register_event(event);
        Ok(assertion)
    }
}

impl fmt::Debug for SamlTokenProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamlTokenProcessor")
            .field("engine", &self.engine)
            .field("trust_store", &self.trust_store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamlConfig;
    use crate::signature::AssertionSigner;
    use crate::token::InMemorySecurityContext;
    use crate::types::constants::confirmation_methods::{SAML2_BEARER, SAML2_HOLDER_OF_KEY};
    use crate::types::{KeyInfoBean, SamlCallback, SamlVersion, SubjectBean};
    use wss_crypto::{Certificate, InMemoryTrustStore, SignatureAlgorithm, SigningKey};

    struct Idp {
        signer: AssertionSigner,
        certificate: Certificate,
    }

    fn idp() -> Idp {
        let certified = rcgen::generate_simple_self_signed(vec!["idp".to_string()]).unwrap();
        let key = SigningKey::from_pkcs8(
            &certified.key_pair.serialize_der(),
            SignatureAlgorithm::EcdsaSha256,
        )
        .unwrap();
        let certificate = Certificate::from_der(certified.cert.der()).unwrap();
        Idp {
            signer: AssertionSigner::new(key).with_certificate(certificate.clone()),
            certificate,
        }
    }

    fn assertion(subject: SubjectBean) -> SamlAssertion {
        let callback = SamlCallback {
            subject: Some(subject),
            ..SamlCallback::default()
        };
        SamlAssertion::build(SamlVersion::V2_0, "https://idp.example.org", &callback).unwrap()
    }

    fn processor(config: SamlConfig, store: InMemoryTrustStore) -> SamlTokenProcessor {
        let engine = Arc::new(SamlEngine::new(config).unwrap());
        SamlTokenProcessor::new(engine, Arc::new(store))
    }

    fn element_of(assertion: &mut SamlAssertion) -> Element {
        Element::parse_str(&assertion.to_xml_string()).unwrap()
    }

    #[test]
    fn registers_trusted_signed_assertion() {
        let idp = idp();
        let mut assertion = assertion(SubjectBean::new("alice", SAML2_BEARER));
        idp.signer.sign(&mut assertion).unwrap();

        let store = InMemoryTrustStore::new().with_certificate("idp", idp.certificate.clone());
        let mut context = InMemorySecurityContext::new();
        let processed = processor(SamlConfig::default(), store)
            .process_element(&element_of(&mut assertion), &mut context)
            .unwrap();

        let id = processed.id().unwrap();
        let token = context.token(id).unwrap();
        assert_eq!(
            token.signature_key_info().unwrap().certificates(),
            &[idp.certificate]
        );
        assert_eq!(
            context.events(),
            &[SecurityEvent::SamlToken {
                issuer: Some("https://idp.example.org".to_string()),
                version: SamlVersion::V2_0,
                token_id: id.to_string(),
            }]
        );
    }

    #[test]
    fn untrusted_signer_is_rejected_unless_disabled() {
        let idp = idp();
        let mut assertion = assertion(SubjectBean::new("alice", SAML2_BEARER));
        idp.signer.sign(&mut assertion).unwrap();
        let element = element_of(&mut assertion);

        let mut context = InMemorySecurityContext::new();
        let err = processor(SamlConfig::default(), InMemoryTrustStore::new())
            .process_element(&element, &mut context)
            .unwrap_err();
        assert!(matches!(err, SamlError::UntrustedSigner(_)));
        assert!(context.is_empty());

        let config = SamlConfig {
            validate_signature_trust: false,
            ..SamlConfig::default()
        };
        processor(config, InMemoryTrustStore::new())
            .process_element(&element, &mut context)
            .unwrap();
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn unsigned_assertions_follow_config() {
        let mut assertion = assertion(SubjectBean::new("alice", SAML2_BEARER));
        let element = element_of(&mut assertion);

        let mut context = InMemorySecurityContext::new();
        processor(SamlConfig::default(), InMemoryTrustStore::new())
            .process_element(&element, &mut context)
            .unwrap();
        assert_eq!(context.len(), 1);

        let strict = SamlConfig {
            require_signed_assertions: true,
            ..SamlConfig::default()
        };
        let err = processor(strict, InMemoryTrustStore::new())
            .process_element(&element, &mut InMemorySecurityContext::new())
            .unwrap_err();
        assert!(matches!(err, SamlError::UnsignedAssertion(_)));
    }

    #[test]
    fn holder_of_key_key_lands_on_token() {
        let client = idp();
        let mut assertion = assertion(
            SubjectBean::new("alice", SAML2_HOLDER_OF_KEY)
                .with_key_info(KeyInfoBean::from_certificate(client.certificate.clone())),
        );
        let mut context = InMemorySecurityContext::new();
        let processed = processor(SamlConfig::default(), InMemoryTrustStore::new())
            .process_element(&element_of(&mut assertion), &mut context)
            .unwrap();

        let token = context.token(processed.id().unwrap()).unwrap();
        assert_eq!(
            token.subject_key_info().unwrap().certificates(),
            &[client.certificate]
        );
    }

    #[test]
    fn header_with_inherited_namespaces() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">
  <soap:Header>
    <wsse:Security xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">
      <saml2:Assertion ID="_one" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><saml2:Issuer>idp-a</saml2:Issuer></saml2:Assertion>
      <saml2:Assertion ID="_two" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><saml2:Issuer>idp-b</saml2:Issuer></saml2:Assertion>
    </wsse:Security>
  </soap:Header>
  <soap:Body/>
</soap:Envelope>"#;

        let mut context = InMemorySecurityContext::new();
        let ids = processor(SamlConfig::default(), InMemoryTrustStore::new())
            .process_header_str(xml, &mut context)
            .unwrap();
        assert_eq!(ids, vec!["_one", "_two"]);
        assert_eq!(context.token("_two").unwrap().issuer(), Some("idp-b"));
        assert_eq!(context.events().len(), 2);
    }

    #[test]
    fn assertions_outside_security_header_are_skipped() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">
  <soap:Header>
    <saml2:Assertion ID="_header_sibling" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><saml2:Issuer>idp</saml2:Issuer></saml2:Assertion>
    <wsse:Security xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">
      <saml2:Assertion ID="_token" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><saml2:Issuer>idp</saml2:Issuer></saml2:Assertion>
      <wrapper><saml2:Assertion ID="_nested" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><saml2:Issuer>idp</saml2:Issuer></saml2:Assertion></wrapper>
    </wsse:Security>
  </soap:Header>
  <soap:Body>
    <saml2:Assertion ID="_payload" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><saml2:Issuer>idp</saml2:Issuer></saml2:Assertion>
  </soap:Body>
</soap:Envelope>"#;

        let mut context = InMemorySecurityContext::new();
        let ids = processor(SamlConfig::default(), InMemoryTrustStore::new())
            .process_header_str(xml, &mut context)
            .unwrap();
        assert_eq!(ids, vec!["_token"]);
        assert_eq!(context.len(), 1);
        assert!(context.token("_payload").is_none());
    }

    #[test]
    fn failure_keeps_earlier_tokens() {
        let xml = r#"<wsse:Security xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">
  <saml2:Assertion ID="_dup" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><saml2:Issuer>idp</saml2:Issuer></saml2:Assertion>
  <saml2:Assertion ID="_dup" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><saml2:Issuer>idp</saml2:Issuer></saml2:Assertion>
  <saml2:Assertion ID="_after" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><saml2:Issuer>idp</saml2:Issuer></saml2:Assertion>
</wsse:Security>"#;

        let mut context = InMemorySecurityContext::new();
        let err = processor(SamlConfig::default(), InMemoryTrustStore::new())
            .process_header_str(xml, &mut context)
            .unwrap_err();
        assert!(matches!(err, SamlError::DuplicateToken(_)));
        assert_eq!(context.len(), 1);
        assert!(context.token("_dup").is_some());
        assert!(context.token("_after").is_none());
    }

    #[test]
    fn process_events_leaves_trailing_events() {
        let mut assertion = assertion(SubjectBean::new("alice", SAML2_BEARER));
        let xml = format!("<wrap>{}<tail/></wrap>", assertion.to_xml_string());
        let mut events = crate::dom::read_events(&xml).unwrap().into_iter();
        // Skip StartDocument and <wrap>.
        events.next();
        events.next();

        let mut context = InMemorySecurityContext::new();
        processor(SamlConfig::default(), InMemoryTrustStore::new())
            .process_events(&mut events, &mut context)
            .unwrap();
        assert!(matches!(
            events.next(),
            Some(XmlEvent::StartElement(ref s)) if s.name.local_name() == "tail"
        ));
    }
}
