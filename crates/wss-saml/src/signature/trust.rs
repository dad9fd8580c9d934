//! Signature verification against resolved credentials and a trust store.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use wss_crypto::{KeyInfo, TrustStore};

use crate::credential::{CredentialResolver, KeyInfoCredentialResolver};
use crate::error::{SamlError, SamlResult};
use crate::types::SamlAssertion;

use super::{SamlSignatureProfileValidator, SignatureEngine, SignatureProfileValidator, XmlDsigEngine};

/// Verifies an assertion's enveloped signature.
///
/// Runs, in order: credential resolution from the signature's key info,
/// the signature profile check, and cryptographic verification. A failed
/// stage stops the pipeline.
pub struct SignatureTrustVerifier {
    resolver: Arc<dyn CredentialResolver>,
    profile: Arc<dyn SignatureProfileValidator>,
    engine: Arc<dyn SignatureEngine>,
}

impl SignatureTrustVerifier {
    /// Creates a verifier from its three stages.
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        profile: Arc<dyn SignatureProfileValidator>,
        engine: Arc<dyn SignatureEngine>,
    ) -> Self {
        Self {
            resolver,
            profile,
            engine,
        }
    }

    /// Creates a verifier with the standard resolver and profile around
    /// `engine`.
    pub fn with_engine(engine: Arc<dyn SignatureEngine>) -> Self {
        Self::new(
            Arc::new(KeyInfoCredentialResolver),
            Arc::new(SamlSignatureProfileValidator),
            engine,
        )
    }

    /// Returns the credential resolver.
    pub fn resolver(&self) -> &Arc<dyn CredentialResolver> {
        &self.resolver
    }

    /// Verifies the signature of a signed assertion.
    ///
    /// On success the resolved signer key material is cached on the
    /// assertion and returned. Callers check [`SamlAssertion::is_signed`]
    /// first; an unsigned assertion is a verification error here.
    pub fn verify_signature(
        &self,
        assertion: &mut SamlAssertion,
        trust_store: &dyn TrustStore,
    ) -> SamlResult<Arc<KeyInfo>> {
        let key_info = {
            let signature = assertion.signature().ok_or_else(|| {
                SamlError::SignatureVerification("assertion is not signed".to_string())
            })?;
            let key_info_element = signature.key_info().ok_or_else(|| {
                SamlError::CredentialResolution("signature has no KeyInfo".to_string())
            })?;

            let key_info = self
                .resolver
                .resolve(key_info_element, trust_store)?
                .filter(|k| !k.has_no_asymmetric_key())
                .ok_or_else(|| {
                    SamlError::CredentialResolution(
                        "no certificate or public key in signature KeyInfo".to_string(),
                    )
                })?;

            self.profile.validate(signature, assertion.id())?;

            let credential = key_info.credential().ok_or_else(|| {
                SamlError::CredentialResolution("no verification credential".to_string())
            })?;
            self.engine
                .verify(&assertion.signed_element(), signature, &credential)?;
            key_info
        };

        debug!(id = assertion.id(), "assertion signature verified");
        let key_info = Arc::new(key_info);
        assertion.set_signature_key_info(Arc::clone(&key_info));
        Ok(key_info)
    }

    /// Checks that the verified signer is trusted: its leaf certificate,
    /// or its bare public key when no certificate was resolved.
    pub fn verify_signed_assertion(
        &self,
        key_info: &KeyInfo,
        trust_store: &dyn TrustStore,
    ) -> SamlResult<()> {
        let trusted = match key_info.certificates().first() {
            Some(certificate) => trust_store.is_trusted_certificate(certificate),
            None => key_info
                .public_key()
                .is_some_and(|key| trust_store.is_trusted_public_key(key)),
        };
        if trusted {
            return Ok(());
        }

        let signer = key_info
            .certificates()
            .first()
            .map_or_else(|| "public key".to_string(), |c| c.subject().to_string());
        warn!(%signer, "signature verified but signer is not trusted");
        Err(SamlError::UntrustedSigner(signer))
    }
}

impl Default for SignatureTrustVerifier {
    fn default() -> Self {
        Self::with_engine(Arc::new(XmlDsigEngine::default()))
    }
}

impl fmt::Debug for SignatureTrustVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureTrustVerifier").finish_non_exhaustive()
    }
}
