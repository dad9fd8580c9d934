//! Credential resolution from `ds:KeyInfo`.

use tracing::debug;
use wss_crypto::{Certificate, KeyInfo, PublicKey, TrustStore};

use crate::dom::Element;
use crate::error::{SamlError, SamlResult};
use crate::signature::decode_base64;
use crate::types::constants::{DSIG11_NS, DSIG_NS};

/// Derives key material from a `ds:KeyInfo` subtree.
pub trait CredentialResolver: Send + Sync {
    /// Returns the certificates and/or public key `key_info` designates, or
    /// `None` if it designates nothing this resolver can find.
    fn resolve(&self, key_info: &Element, trust_store: &dyn TrustStore)
        -> SamlResult<Option<KeyInfo>>;
}

/// Resolver for the key info forms used in WS-Security SAML tokens.
///
/// Embedded `ds:X509Certificate` values are decoded directly;
/// `ds:X509IssuerSerial` and `ds:KeyName` are looked up in the trust store;
/// `dsig11:DEREncodedKeyValue` yields a bare public key. Certificates win
/// over a bare key.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyInfoCredentialResolver;

impl KeyInfoCredentialResolver {
    /// Creates the resolver.
    pub const fn new() -> Self {
        Self
    }

    fn x509_data(
        data: &Element,
        trust_store: &dyn TrustStore,
        certificates: &mut Vec<Certificate>,
    ) -> SamlResult<()> {
        for entry in data.child_elements().filter(|e| e.namespace() == Some(DSIG_NS)) {
            match entry.local_name() {
                "X509Certificate" => {
                    let certificate = Certificate::from_base64(&entry.text()).map_err(|e| {
                        SamlError::CredentialResolution(format!("invalid X509Certificate: {e}"))
                    })?;
                    certificates.push(certificate);
                }
                "X509IssuerSerial" => {
                    let issuer = entry.child_text(DSIG_NS, "X509IssuerName").unwrap_or_default();
                    let serial = entry.child_text(DSIG_NS, "X509SerialNumber").unwrap_or_default();
                    match trust_store.certificate_by_issuer_serial(&issuer, &serial) {
                        Some(certificate) => certificates.push(certificate),
                        None => debug!(%issuer, %serial, "no certificate for issuer/serial"),
                    }
                }
                other => debug!(element = other, "ignoring X509Data entry"),
            }
        }
        Ok(())
    }
}

impl CredentialResolver for KeyInfoCredentialResolver {
    fn resolve(
        &self,
        key_info: &Element,
        trust_store: &dyn TrustStore,
    ) -> SamlResult<Option<KeyInfo>> {
        let mut certificates = Vec::new();
        let mut public_key = None;

        for child in key_info.child_elements() {
            match (child.namespace(), child.local_name()) {
                (Some(DSIG_NS), "X509Data") => {
                    Self::x509_data(child, trust_store, &mut certificates)?;
                }
                (Some(DSIG_NS), "KeyName") => {
                    let name = child.text();
                    match trust_store.certificates(name.trim()) {
                        Some(chain) => certificates.extend(chain),
                        None => debug!(key_name = name.trim(), "key name not in trust store"),
                    }
                }
                (Some(DSIG11_NS), "DEREncodedKeyValue") => {
                    let der = decode_base64(&child.text())?;
                    let key = PublicKey::from_spki_der(&der).map_err(|e| {
                        SamlError::CredentialResolution(format!("invalid DEREncodedKeyValue: {e}"))
                    })?;
                    public_key = Some(key);
                }
                (_, other) => debug!(element = other, "unsupported KeyInfo content"),
            }
        }

        if !certificates.is_empty() {
            return Ok(Some(KeyInfo::from_certificates(certificates)));
        }
        Ok(public_key.map(KeyInfo::from_public_key))
    }
}

/// Returns the `ds:KeyName` values in a key info subtree.
pub(crate) fn key_names(key_info: &Element) -> Vec<String> {
    key_info
        .children_named(DSIG_NS, "KeyName")
        .map(|k| k.text().trim().to_string())
        .collect()
}
