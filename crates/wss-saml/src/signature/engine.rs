//! Cryptographic verification of enveloped assertion signatures.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use wss_crypto::{digest, verify_signature, Credential, CryptoError, DigestAlgorithm, SignatureAlgorithm};

use crate::dom::Element;
use crate::error::{SamlError, SamlResult};
use crate::types::constants::canonicalization_algorithms::{
    EXCLUSIVE_C14N, EXCLUSIVE_C14N_WITH_COMMENTS, INCLUSIVE_C14N, INCLUSIVE_C14N_WITH_COMMENTS,
};
use crate::types::constants::transforms::ENVELOPED_SIGNATURE;
use crate::types::constants::DSIG_NS;

use super::{C14nContext, Reference, Signature, XmlCanonicalizer};

/// Turns an element subtree into canonical octets.
pub trait Canonicalizer: Send + Sync {
    /// Canonicalizes `element` as a standalone subtree.
    fn canonicalize(&self, element: &Element, algorithm: &str) -> SamlResult<Vec<u8>> {
        self.canonicalize_in_context(element, algorithm, &C14nContext::default())
    }

    /// Canonicalizes `element` with the namespace context of its ancestors.
    fn canonicalize_in_context(
        &self,
        element: &Element,
        algorithm: &str,
        context: &C14nContext,
    ) -> SamlResult<Vec<u8>>;
}

/// Verifies a signature over the element it is enveloped in.
pub trait SignatureEngine: Send + Sync {
    /// Checks the reference digest over `signed` and the signature value
    /// with the key in `credential`.
    fn verify(&self, signed: &Element, signature: &Signature, credential: &Credential)
        -> SamlResult<()>;
}

/// XML-DSig verification for enveloped signatures.
pub struct XmlDsigEngine {
    canonicalizer: Arc<dyn Canonicalizer>,
    allow_sha1: bool,
}

impl XmlDsigEngine {
    /// Creates an engine using `canonicalizer`.
    pub fn new(canonicalizer: Arc<dyn Canonicalizer>) -> Self {
        Self {
            canonicalizer,
            allow_sha1: false,
        }
    }

    /// Allows SHA-1 digests and signatures (not recommended).
    #[must_use]
    pub fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    fn signature_algorithm(&self, signature: &Signature) -> SamlResult<SignatureAlgorithm> {
        let algorithm = signature
            .algorithm()
            .map_err(|e| SamlError::SignatureVerification(e.to_string()))?;
        if algorithm.is_deprecated() && !self.allow_sha1 {
            return Err(SamlError::SignatureVerification(
                "SHA-1 signatures are not allowed".to_string(),
            ));
        }
        Ok(algorithm)
    }

    fn verify_reference(&self, signed: &Element, reference: &Reference) -> SamlResult<()> {
        let algorithm = DigestAlgorithm::from_uri(&reference.digest_method)
            .map_err(|e| SamlError::SignatureVerification(e.to_string()))?;
        if algorithm.is_deprecated() && !self.allow_sha1 {
            return Err(SamlError::SignatureVerification(
                "SHA-1 digests are not allowed".to_string(),
            ));
        }

        if let Some(fragment) = reference.uri.as_deref().and_then(|u| u.strip_prefix('#')) {
            if element_id(signed) != Some(fragment) {
                return Err(SamlError::SignatureVerification(format!(
                    "reference #{fragment} does not resolve to the signed element"
                )));
            }
        }

        let octets = transform_octets(
            self.canonicalizer.as_ref(),
            signed,
            &reference.transforms,
            &reference.inclusive_prefixes,
        )?;
        if digest(algorithm, &octets) != reference.digest_value {
            return Err(SamlError::SignatureVerification(
                "reference digest value mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for XmlDsigEngine {
    fn default() -> Self {
        Self::new(Arc::new(XmlCanonicalizer))
    }
}

impl fmt::Debug for XmlDsigEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDsigEngine")
            .field("allow_sha1", &self.allow_sha1)
            .finish_non_exhaustive()
    }
}

impl SignatureEngine for XmlDsigEngine {
    fn verify(
        &self,
        signed: &Element,
        signature: &Signature,
        credential: &Credential,
    ) -> SamlResult<()> {
        let algorithm = self.signature_algorithm(signature)?;

        let references = &signature.signed_info().references;
        if references.is_empty() {
            return Err(SamlError::SignatureVerification(
                "signature has no references".to_string(),
            ));
        }
        for reference in references {
            self.verify_reference(signed, reference)?;
        }

        let context = signed_info_context(signed, signature);
        let signed_info = self.canonicalizer.canonicalize_in_context(
            signature.signed_info_element(),
            &signature.signed_info().canonicalization_method,
            &context,
        )?;
        verify_signature(
            credential.public_key(),
            algorithm,
            &signed_info,
            signature.signature_value(),
        )
        .map_err(|e| match e {
            CryptoError::Verification => {
                SamlError::SignatureVerification("signature value mismatch".to_string())
            }
            other => SamlError::SignatureVerification(other.to_string()),
        })?;

        debug!(algorithm = algorithm.uri(), "signature verified");
        Ok(())
    }
}

/// Returns the `ID` (SAML 2.0) or `AssertionID` (SAML 1.1) of an element.
pub(crate) fn element_id(element: &Element) -> Option<&str> {
    element.attr("ID").or_else(|| element.attr("AssertionID"))
}

/// Namespace context of `ds:SignedInfo` inside `signed`: the declarations
/// of the signed element and of its `ds:Signature` child.
pub(crate) fn signed_info_context(signed: &Element, signature: &Signature) -> C14nContext {
    C14nContext::inherited_from(std::iter::once(signed).chain(signed.child(DSIG_NS, "Signature")))
        .with_inclusive_prefixes(&signature.signed_info().inclusive_prefixes)
}

/// Applies a reference's transform chain to `element` and returns the
/// octets to digest. Without a canonicalization transform the result is
/// canonicalized with inclusive C14N. `element` is the apex; declarations
/// inherited from outside it must already be copied onto it.
pub(crate) fn transform_octets(
    canonicalizer: &dyn Canonicalizer,
    element: &Element,
    transforms: &[String],
    inclusive_prefixes: &[String],
) -> SamlResult<Vec<u8>> {
    let mut node = element.clone();
    let mut canonical_with = None;
    for transform in transforms {
        match transform.as_str() {
            ENVELOPED_SIGNATURE => {
                node.remove_children(DSIG_NS, "Signature");
            }
            EXCLUSIVE_C14N
            | EXCLUSIVE_C14N_WITH_COMMENTS
            | INCLUSIVE_C14N
            | INCLUSIVE_C14N_WITH_COMMENTS => canonical_with = Some(transform.as_str()),
            other => {
                return Err(SamlError::SignatureVerification(format!(
                    "unsupported transform: {other}"
                )));
            }
        }
    }
    let context = C14nContext::default().with_inclusive_prefixes(inclusive_prefixes);
    canonicalizer.canonicalize_in_context(&node, canonical_with.unwrap_or(INCLUSIVE_C14N), &context)
}
