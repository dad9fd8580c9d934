//! XML Signature support for SAML assertions.
//!
//! [`Signature`] is the parsed form of an enveloped `<ds:Signature>`. The
//! submodules check it against the SAML signature profile, verify it
//! cryptographically, create new ones and tie the three together with
//! credential resolution in [`SignatureTrustVerifier`].

mod c14n;
mod engine;
mod signer;
mod trust;
mod validator;

pub use c14n::{C14nContext, XmlCanonicalizer};
pub use engine::{Canonicalizer, SignatureEngine, XmlDsigEngine};
pub use signer::AssertionSigner;
pub use trust::SignatureTrustVerifier;
pub use validator::{SamlSignatureProfileValidator, SignatureProfileValidator};

use base64::Engine;
use wss_crypto::SignatureAlgorithm;

use crate::dom::Element;
use crate::error::{SamlError, SamlResult};
use crate::types::constants::canonicalization_algorithms::{
    EXCLUSIVE_C14N, EXCLUSIVE_C14N_WITH_COMMENTS,
};
use crate::types::constants::{DSIG_NS, DSIG_PREFIX, EXC_C14N_NS, EXC_C14N_PREFIX};

/// A `<ds:Reference>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Reference URI; `None` when the attribute is absent.
    pub uri: Option<String>,
    /// Transform algorithm URIs in order.
    pub transforms: Vec<String>,
    /// `InclusiveNamespaces` prefix list of the exclusive C14N transform.
    pub inclusive_prefixes: Vec<String>,
    /// Digest algorithm URI.
    pub digest_method: String,
    /// Raw digest value.
    pub digest_value: Vec<u8>,
}

impl Reference {
    fn from_element(element: &Element) -> SamlResult<Self> {
        let mut transforms = Vec::new();
        let mut inclusive_prefixes = Vec::new();
        let transform_elements = element
            .child(DSIG_NS, "Transforms")
            .into_iter()
            .flat_map(|t| t.children_named(DSIG_NS, "Transform"));
        for transform in transform_elements {
            let algorithm = algorithm_attr(transform)?;
            if is_exclusive(algorithm) {
                inclusive_prefixes.extend(prefix_list(transform));
            }
            transforms.push(algorithm.to_string());
        }
        let digest_method = element
            .child(DSIG_NS, "DigestMethod")
            .ok_or_else(|| missing("DigestMethod"))
            .and_then(algorithm_attr)?
            .to_string();
        let digest_value = element
            .child(DSIG_NS, "DigestValue")
            .ok_or_else(|| missing("DigestValue"))?
            .text();
        Ok(Self {
            uri: element.attr("URI").map(str::to_string),
            transforms,
            inclusive_prefixes,
            digest_method,
            digest_value: decode_base64(&digest_value)?,
        })
    }

    fn to_element(&self) -> Element {
        let transforms = (!self.transforms.is_empty()).then(|| {
            self.transforms.iter().fold(ds("Transforms"), |acc, uri| {
                let prefixes = is_exclusive(uri).then_some(self.inclusive_prefixes.as_slice());
                acc.with_child(algorithm_element("Transform", uri, prefixes))
            })
        });
        ds("Reference")
            .with_opt_attr("URI", self.uri.as_deref())
            .with_opt_child(transforms)
            .with_child(ds("DigestMethod").with_attr("Algorithm", self.digest_method.as_str()))
            .with_child(ds("DigestValue").with_text(encode_base64(&self.digest_value)))
    }
}

/// A `<ds:SignedInfo>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInfo {
    /// Canonicalization algorithm URI.
    pub canonicalization_method: String,
    /// `InclusiveNamespaces` prefix list of an exclusive canonicalization
    /// method.
    pub inclusive_prefixes: Vec<String>,
    /// Signature algorithm URI.
    pub signature_method: String,
    /// References in document order.
    pub references: Vec<Reference>,
}

impl SignedInfo {
    fn from_element(element: &Element) -> SamlResult<Self> {
        let method = element
            .child(DSIG_NS, "CanonicalizationMethod")
            .ok_or_else(|| missing("CanonicalizationMethod"))?;
        let canonicalization_method = algorithm_attr(method)?.to_string();
        let inclusive_prefixes = if is_exclusive(&canonicalization_method) {
            prefix_list(method)
        } else {
            Vec::new()
        };
        let signature_method = element
            .child(DSIG_NS, "SignatureMethod")
            .ok_or_else(|| missing("SignatureMethod"))
            .and_then(algorithm_attr)?
            .to_string();
        let references = element
            .children_named(DSIG_NS, "Reference")
            .map(Reference::from_element)
            .collect::<SamlResult<Vec<_>>>()?;
        Ok(Self {
            canonicalization_method,
            inclusive_prefixes,
            signature_method,
            references,
        })
    }

    /// Marshals to a `<ds:SignedInfo>` element.
    pub fn to_element(&self) -> Element {
        let prefixes = is_exclusive(&self.canonicalization_method)
            .then_some(self.inclusive_prefixes.as_slice());
        let mut element = ds("SignedInfo")
            .with_child(algorithm_element(
                "CanonicalizationMethod",
                &self.canonicalization_method,
                prefixes,
            ))
            .with_child(ds("SignatureMethod").with_attr("Algorithm", self.signature_method.as_str()));
        for reference in &self.references {
            element.append_element(reference.to_element());
        }
        element
    }
}

/// An enveloped XML signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    signed_info: SignedInfo,
    signed_info_element: Element,
    signature_value: Vec<u8>,
    key_info: Option<Element>,
}

impl Signature {
    /// Creates a signature from a freshly built `SignedInfo`.
    pub fn new(signed_info: SignedInfo, signature_value: Vec<u8>, key_info: Option<Element>) -> Self {
        let signed_info_element = signed_info.to_element();
        Self {
            signed_info,
            signed_info_element,
            signature_value,
            key_info,
        }
    }

    /// Parses a `<ds:Signature>` element.
    ///
    /// The original `SignedInfo` subtree is kept so verification
    /// canonicalizes exactly what was signed.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(DSIG_NS, "Signature") {
            return Err(SamlError::Unmarshal(format!(
                "expected ds:Signature, found {}",
                element.name().qualified()
            )));
        }
        let signed_info_element = element
            .child(DSIG_NS, "SignedInfo")
            .ok_or_else(|| missing("SignedInfo"))?
            .clone();
        let signed_info = SignedInfo::from_element(&signed_info_element)?;
        let signature_value = element
            .child(DSIG_NS, "SignatureValue")
            .ok_or_else(|| missing("SignatureValue"))?
            .text();
        Ok(Self {
            signed_info,
            signed_info_element,
            signature_value: decode_base64(&signature_value)?,
            key_info: element.child(DSIG_NS, "KeyInfo").cloned(),
        })
    }

    /// Marshals to a `<ds:Signature>` element declaring the `ds` prefix.
    pub fn to_element(&self) -> Element {
        signature_envelope()
            .with_child(self.signed_info_element.clone())
            .with_child(ds("SignatureValue").with_text(encode_base64(&self.signature_value)))
            .with_opt_child(self.key_info.clone())
    }

    /// Returns the parsed `SignedInfo`.
    pub fn signed_info(&self) -> &SignedInfo {
        &self.signed_info
    }

    /// Returns the `SignedInfo` subtree that was signed.
    pub fn signed_info_element(&self) -> &Element {
        &self.signed_info_element
    }

    /// Returns the raw signature value.
    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    /// Returns the embedded `<ds:KeyInfo>` subtree.
    pub fn key_info(&self) -> Option<&Element> {
        self.key_info.as_ref()
    }

    /// Returns the signature algorithm.
    pub fn algorithm(&self) -> SamlResult<SignatureAlgorithm> {
        Ok(SignatureAlgorithm::from_uri(&self.signed_info.signature_method)?)
    }
}

/// An empty `<ds:Signature>` declaring the `ds` prefix.
pub(crate) fn signature_envelope() -> Element {
    let mut element = ds("Signature");
    element.declare_namespace(Some(DSIG_PREFIX), DSIG_NS);
    element
}

/// Creates an empty `ds:` element.
pub(crate) fn ds(local: &str) -> Element {
    Element::new_ns(DSIG_NS, DSIG_PREFIX, local)
}

pub(crate) fn decode_base64(text: &str) -> SamlResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn algorithm_attr(element: &Element) -> SamlResult<&str> {
    element.attr("Algorithm").ok_or_else(|| {
        SamlError::Unmarshal(format!("ds:{} without Algorithm", element.local_name()))
    })
}

fn is_exclusive(algorithm: &str) -> bool {
    algorithm == EXCLUSIVE_C14N || algorithm == EXCLUSIVE_C14N_WITH_COMMENTS
}

/// Reads `ec:InclusiveNamespaces/@PrefixList` below a transform or
/// canonicalization method.
fn prefix_list(method: &Element) -> Vec<String> {
    method
        .child(EXC_C14N_NS, "InclusiveNamespaces")
        .and_then(|n| n.attr("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// A `ds:` element with an `Algorithm` attribute and, when `prefixes` is
/// non-empty, an `ec:InclusiveNamespaces` child.
fn algorithm_element(local: &str, algorithm: &str, prefixes: Option<&[String]>) -> Element {
    let element = ds(local).with_attr("Algorithm", algorithm);
    match prefixes {
        Some(prefixes) if !prefixes.is_empty() => {
            let mut inclusive = Element::new_ns(EXC_C14N_NS, EXC_C14N_PREFIX, "InclusiveNamespaces");
            inclusive.declare_namespace(Some(EXC_C14N_PREFIX), EXC_C14N_NS);
            element.with_child(inclusive.with_attr("PrefixList", prefixes.join(" ")))
        }
        _ => element,
    }
}

fn missing(local: &str) -> SamlError {
    SamlError::Unmarshal(format!("ds:Signature is missing ds:{local}"))
}
