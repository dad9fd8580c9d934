//! X.509 certificate and public key material.
//!
//! Only single-certificate extraction is performed here: a certificate is
//! decoded, its identifying fields and subject public key are exposed, and
//! nothing is said about the chain it belongs to.

use std::fmt;

use base64::Engine;
use x509_parser::prelude::*;

use crate::error::{CryptoError, CryptoResult};

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_ED25519: &str = "1.3.101.112";

/// Public key algorithm family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// RSA (`rsaEncryption`).
    Rsa,
    /// ECDSA over P-256.
    EcP256,
    /// ECDSA over P-384.
    EcP384,
    /// ECDSA over P-521.
    EcP521,
    /// Ed25519.
    Ed25519,
    /// Anything else, identified by its OID.
    Other(String),
}

/// A subject public key.
///
/// `spki_der` is the full `SubjectPublicKeyInfo`; `key_bytes` is the content
/// of its bit string (PKCS#1 `RSAPublicKey` for RSA, the uncompressed point
/// for EC keys), which is what the verification primitives consume.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    algorithm: KeyAlgorithm,
    spki_der: Vec<u8>,
    key_bytes: Vec<u8>,
}

impl PublicKey {
    /// Decodes a DER `SubjectPublicKeyInfo`.
    pub fn from_spki_der(der: &[u8]) -> CryptoResult<Self> {
        let (_, spki) = SubjectPublicKeyInfo::from_der(der)
            .map_err(|e| CryptoError::InvalidKey(format!("failed to parse SPKI: {e}")))?;
        Ok(Self::from_spki(&spki))
    }

    fn from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Self {
        let key_bytes = spki.subject_public_key.data.to_vec();
        let algorithm = match spki.algorithm.algorithm.to_id_string().as_str() {
            OID_RSA_ENCRYPTION => KeyAlgorithm::Rsa,
            OID_ED25519 => KeyAlgorithm::Ed25519,
            // Curve is implied by the uncompressed point length.
            OID_EC_PUBLIC_KEY => match key_bytes.len() {
                65 => KeyAlgorithm::EcP256,
                97 => KeyAlgorithm::EcP384,
                133 => KeyAlgorithm::EcP521,
                n => KeyAlgorithm::Other(format!("{OID_EC_PUBLIC_KEY}/{n}")),
            },
            other => KeyAlgorithm::Other(other.to_string()),
        };

        Self {
            algorithm,
            spki_der: spki.raw.to_vec(),
            key_bytes,
        }
    }

    /// Returns the key algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> &KeyAlgorithm {
        &self.algorithm
    }

    /// Returns the DER `SubjectPublicKeyInfo`.
    #[must_use]
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn key_bytes(&self) -> &[u8] {
        &self.key_bytes
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .field("len", &self.key_bytes.len())
            .finish()
    }
}

/// A decoded X.509 certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial: String,
    public_key: PublicKey,
}

impl Certificate {
    /// Decodes a DER certificate.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CryptoError::InvalidCertificate(format!("failed to parse: {e}")))?;

        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.tbs_certificate.serial.to_string(),
            public_key: PublicKey::from_spki(cert.public_key()),
        })
    }

    /// Decodes a base64 DER certificate, as carried in `ds:X509Certificate`.
    ///
    /// Embedded whitespace is ignored.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let der = base64::engine::general_purpose::STANDARD.decode(compact)?;
        Self::from_der(&der)
    }

    /// Decodes a PEM certificate.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let der = pem_to_der(pem, "CERTIFICATE")
            .ok_or_else(|| CryptoError::Decode("invalid certificate PEM".to_string()))?;
        Self::from_der(&der)
    }

    /// Returns the DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the base64 DER encoding.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.der)
    }

    /// Returns the subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the issuer distinguished name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the serial number in decimal.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Returns the subject public key.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

/// Extracts DER data from a PEM string.
#[must_use]
pub fn pem_to_der(pem: &str, label: &str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem.find(&begin)? + begin.len();
    let end_pos = pem.find(&end)?;
    if end_pos < start {
        return None;
    }

    let b64_data: String = pem[start..end_pos]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD.decode(b64_data).ok()
}
