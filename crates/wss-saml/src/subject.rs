//! Holder-of-key subject confirmation.
//!
//! A holder-of-key assertion binds the subject to key material carried in
//! the subject confirmation. [`SubjectConfirmationResolver`] extracts that
//! key so a later step can check proof of possession.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use wss_crypto::{KeyCallback, KeyInfo, TrustStore};

use crate::credential::{key_names, CredentialResolver, KeyInfoCredentialResolver};
use crate::dom::Element;
use crate::error::{SamlError, SamlResult};
use crate::types::{is_method_holder_of_key, AssertionModel, SamlAssertion};

/// Extracts subject key material from an assertion.
pub trait SubjectKeyExtractor: Send + Sync {
    /// Returns the key designated by the assertion's subject confirmation.
    fn extract(
        &self,
        assertion: &SamlAssertion,
        trust_store: &dyn TrustStore,
        callback: Option<&dyn KeyCallback>,
    ) -> SamlResult<Option<KeyInfo>>;
}

/// Reads `ds:KeyInfo` from subject confirmations.
///
/// SAML 2.0 keys come from `SubjectConfirmationData`, SAML 1.1 keys from
/// the `SubjectConfirmation` of each statement subject. The first key info
/// that resolves wins. A `ds:KeyName` the trust store does not know is
/// handed to the key callback as a secret key name.
pub struct KeyInfoSubjectKeyExtractor {
    resolver: Arc<dyn CredentialResolver>,
}

impl KeyInfoSubjectKeyExtractor {
    /// Creates an extractor that resolves key info with `resolver`.
    pub fn new(resolver: Arc<dyn CredentialResolver>) -> Self {
        Self { resolver }
    }

    fn candidates(assertion: &SamlAssertion) -> Vec<&Element> {
        match assertion.model() {
            AssertionModel::Saml2(a) => a
                .subject
                .iter()
                .flat_map(|s| &s.confirmations)
                .filter_map(|c| c.data.as_ref())
                .flat_map(|d| &d.key_infos)
                .collect(),
            AssertionModel::Saml1(a) => a
                .subjects()
                .filter_map(|s| s.confirmation.as_ref())
                .filter_map(|c| c.key_info.as_ref())
                .collect(),
        }
    }
}

impl Default for KeyInfoSubjectKeyExtractor {
    fn default() -> Self {
        Self::new(Arc::new(KeyInfoCredentialResolver))
    }
}

impl fmt::Debug for KeyInfoSubjectKeyExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyInfoSubjectKeyExtractor").finish_non_exhaustive()
    }
}

impl SubjectKeyExtractor for KeyInfoSubjectKeyExtractor {
    fn extract(
        &self,
        assertion: &SamlAssertion,
        trust_store: &dyn TrustStore,
        callback: Option<&dyn KeyCallback>,
    ) -> SamlResult<Option<KeyInfo>> {
        for key_info in Self::candidates(assertion) {
            if let Some(resolved) = self.resolver.resolve(key_info, trust_store)? {
                return Ok(Some(resolved));
            }
            let Some(callback) = callback else { continue };
            for name in key_names(key_info) {
                if let Some(secret) = callback.secret_key(&name) {
                    debug!(key_name = %name, "subject key supplied by callback");
                    return Ok(Some(KeyInfo::from_secret(secret)));
                }
            }
        }
        Ok(None)
    }
}

/// Applies subject confirmation rules to an assertion.
pub struct SubjectConfirmationResolver {
    extractor: Arc<dyn SubjectKeyExtractor>,
}

impl SubjectConfirmationResolver {
    /// Creates a resolver using `extractor`.
    pub fn new(extractor: Arc<dyn SubjectKeyExtractor>) -> Self {
        Self { extractor }
    }

    /// Resolves the holder-of-key subject key.
    ///
    /// Only the first confirmation method counts. If it is holder-of-key
    /// the subject key must resolve or [`SamlError::MissingKey`] is
    /// returned; the key is cached on the assertion. Any other method
    /// yields `Ok(None)`.
    pub fn resolve_holder_of_key(
        &self,
        assertion: &mut SamlAssertion,
        trust_store: &dyn TrustStore,
        callback: Option<&dyn KeyCallback>,
    ) -> SamlResult<Option<Arc<KeyInfo>>> {
        let methods = assertion.confirmation_methods();
        let Some(method) = methods.first() else {
            return Ok(None);
        };
        if !is_method_holder_of_key(method) {
            return Ok(None);
        }

        let key_info = self
            .extractor
            .extract(assertion, trust_store, callback)?
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                SamlError::MissingKey(format!(
                    "holder-of-key assertion {} has no usable subject key",
                    assertion.id().unwrap_or("<no id>")
                ))
            })?;

        let key_info = Arc::new(key_info);
        assertion.set_subject_key_info(Arc::clone(&key_info));
        Ok(Some(key_info))
    }
}

impl Default for SubjectConfirmationResolver {
    fn default() -> Self {
        Self::new(Arc::new(KeyInfoSubjectKeyExtractor::default()))
    }
}

impl fmt::Debug for SubjectConfirmationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubjectConfirmationResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::constants::confirmation_methods::{
        SAML1_HOLDER_OF_KEY, SAML2_BEARER, SAML2_HOLDER_OF_KEY, SAML2_SENDER_VOUCHES,
    };
    use crate::types::{
        AuthenticationStatementBean, KeyInfoBean, SamlCallback, SamlVersion, SubjectBean,
    };
    use wss_crypto::{Certificate, InMemoryTrustStore, StaticKeyCallback};

    fn certificate() -> Certificate {
        let certified = rcgen::generate_simple_self_signed(vec!["client".to_string()]).unwrap();
        Certificate::from_der(certified.cert.der()).unwrap()
    }

    fn saml2(subject: SubjectBean) -> SamlAssertion {
        let callback = SamlCallback {
            subject: Some(subject),
            ..SamlCallback::default()
        };
        SamlAssertion::build(SamlVersion::V2_0, "idp", &callback).unwrap()
    }

    #[test]
    fn saml2_holder_of_key_certificate() {
        let cert = certificate();
        let mut assertion = saml2(
            SubjectBean::new("alice", SAML2_HOLDER_OF_KEY)
                .with_key_info(KeyInfoBean::from_certificate(cert.clone())),
        );

        let key_info = SubjectConfirmationResolver::default()
            .resolve_holder_of_key(&mut assertion, &InMemoryTrustStore::new(), None)
            .unwrap()
            .unwrap();
        assert_eq!(key_info.certificates(), &[cert]);
        assert!(assertion.subject_key_info().is_some());
    }

    #[test]
    fn saml1_holder_of_key_from_statement_subject() {
        let cert = certificate();
        let callback = SamlCallback {
            subject: Some(
                SubjectBean::new("alice", SAML1_HOLDER_OF_KEY)
                    .with_key_info(KeyInfoBean::from_public_key(cert.public_key().clone())),
            ),
            authentication_statements: vec![AuthenticationStatementBean::default()],
            ..SamlCallback::default()
        };
        let mut assertion = SamlAssertion::build(SamlVersion::V1_1, "idp", &callback).unwrap();

        let key_info = SubjectConfirmationResolver::default()
            .resolve_holder_of_key(&mut assertion, &InMemoryTrustStore::new(), None)
            .unwrap()
            .unwrap();
        assert_eq!(key_info.public_key(), Some(cert.public_key()));
    }

    #[test]
    fn key_name_falls_back_to_callback_secret() {
        let mut assertion = saml2(
            SubjectBean::new("alice", SAML2_HOLDER_OF_KEY)
                .with_key_info(KeyInfoBean::from_key_name("session-key")),
        );
        let callback = StaticKeyCallback::new().with_key("session-key", vec![7; 32]);

        let key_info = SubjectConfirmationResolver::default()
            .resolve_holder_of_key(&mut assertion, &InMemoryTrustStore::new(), Some(&callback))
            .unwrap()
            .unwrap();
        assert_eq!(key_info.secret(), Some(&[7u8; 32][..]));
    }

    #[test]
    fn holder_of_key_without_key_is_missing_key() {
        let mut assertion = saml2(
            SubjectBean::new("alice", SAML2_HOLDER_OF_KEY)
                .with_key_info(KeyInfoBean::from_key_name("unknown")),
        );
        let err = SubjectConfirmationResolver::default()
            .resolve_holder_of_key(&mut assertion, &InMemoryTrustStore::new(), None)
            .unwrap_err();
        assert!(matches!(err, SamlError::MissingKey(_)));
        assert!(assertion.subject_key_info().is_none());
    }

    #[test]
    fn other_methods_yield_nothing() {
        for method in [SAML2_BEARER, SAML2_SENDER_VOUCHES] {
            let mut assertion = saml2(SubjectBean::new("alice", method));
            let resolved = SubjectConfirmationResolver::default()
                .resolve_holder_of_key(&mut assertion, &InMemoryTrustStore::new(), None)
                .unwrap();
            assert!(resolved.is_none());
        }
    }
}
