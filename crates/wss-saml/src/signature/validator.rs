//! SAML signature profile checks.
//!
//! An assertion signature must be an enveloped signature over the whole
//! assertion: one reference, pointing at the document or at the
//! assertion's own ID, with only the enveloped and exclusive
//! canonicalization transforms.

use crate::error::{SamlError, SamlResult};
use crate::types::constants::{canonicalization_algorithms, transforms};

use super::{Reference, Signature};

/// Structural checks on a signature, independent of any key.
pub trait SignatureProfileValidator: Send + Sync {
    /// Validates `signature` for the assertion identified by `assertion_id`.
    fn validate(&self, signature: &Signature, assertion_id: Option<&str>) -> SamlResult<()>;
}

/// The SAML assertion signature profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamlSignatureProfileValidator;

impl SamlSignatureProfileValidator {
    /// Creates the validator.
    pub const fn new() -> Self {
        Self
    }

    fn validate_reference_uri(reference: &Reference, assertion_id: Option<&str>) -> SamlResult<()> {
        let Some(uri) = reference.uri.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(());
        };
        let Some(fragment) = uri.strip_prefix('#') else {
            return Err(SamlError::SignatureProfile(format!(
                "reference URI is not a same-document reference: {uri}"
            )));
        };
        match assertion_id {
            Some(id) if id == fragment => Ok(()),
            Some(id) => Err(SamlError::SignatureProfile(format!(
                "reference URI #{fragment} does not match assertion ID {id}"
            ))),
            None => Err(SamlError::SignatureProfile(format!(
                "reference URI #{fragment} but the assertion has no ID"
            ))),
        }
    }

    fn validate_transforms(reference: &Reference) -> SamlResult<()> {
        if reference.transforms.len() > 2 {
            return Err(SamlError::SignatureProfile(format!(
                "reference has {} transforms, at most 2 are allowed",
                reference.transforms.len()
            )));
        }

        let mut enveloped = false;
        for transform in &reference.transforms {
            match transform.as_str() {
                transforms::ENVELOPED_SIGNATURE => enveloped = true,
                canonicalization_algorithms::EXCLUSIVE_C14N
                | canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS => {}
                other => {
                    return Err(SamlError::SignatureProfile(format!(
                        "invalid signature transform: {other}"
                    )));
                }
            }
        }

        if !enveloped {
            return Err(SamlError::SignatureProfile(
                "signature is missing the enveloped signature transform".to_string(),
            ));
        }
        Ok(())
    }
}

impl SignatureProfileValidator for SamlSignatureProfileValidator {
    fn validate(&self, signature: &Signature, assertion_id: Option<&str>) -> SamlResult<()> {
        let references = &signature.signed_info().references;
        let [reference] = references.as_slice() else {
            return Err(SamlError::SignatureProfile(format!(
                "signature must contain exactly one Reference, found {}",
                references.len()
            )));
        };

        Self::validate_reference_uri(reference, assertion_id)?;
        Self::validate_transforms(reference)
    }
}
