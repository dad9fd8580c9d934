//! Resolved credential material.

use std::fmt;

use crate::certificate::{Certificate, PublicKey};

/// Credential material resolved from a `ds:KeyInfo`.
///
/// Produced by credential resolution; shared read-only once resolved.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct KeyInfo {
    certificates: Vec<Certificate>,
    public_key: Option<PublicKey>,
    secret: Option<Vec<u8>>,
}

impl KeyInfo {
    /// Creates key info from a certificate chain (leaf first).
    #[must_use]
    pub fn from_certificates(certificates: Vec<Certificate>) -> Self {
        Self {
            certificates,
            ..Self::default()
        }
    }

    /// Creates key info from a bare public key.
    #[must_use]
    pub fn from_public_key(public_key: PublicKey) -> Self {
        Self {
            public_key: Some(public_key),
            ..Self::default()
        }
    }

    /// Creates key info from a symmetric secret.
    #[must_use]
    pub fn from_secret(secret: Vec<u8>) -> Self {
        Self {
            secret: Some(secret),
            ..Self::default()
        }
    }

    /// Returns the certificates, leaf first.
    #[must_use]
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// Returns the bare public key, if any.
    #[must_use]
    pub const fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    /// Returns the symmetric secret, if any.
    #[must_use]
    pub fn secret(&self) -> Option<&[u8]> {
        self.secret.as_deref()
    }

    /// Returns true if no certificate or public key is present.
    #[must_use]
    pub fn has_no_asymmetric_key(&self) -> bool {
        self.certificates.is_empty() && self.public_key.is_none()
    }

    /// Returns true if nothing at all was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.has_no_asymmetric_key() && self.secret.is_none()
    }

    /// Builds a verification credential, preferring the leaf certificate.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.certificates.first().map_or_else(
            || self.public_key.clone().map(Credential::PublicKey),
            |cert| Some(Credential::Certificate(cert.clone())),
        )
    }
}

impl fmt::Debug for KeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyInfo")
            .field("certificates", &self.certificates)
            .field("public_key", &self.public_key)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A credential used to verify a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// An entity certificate.
    Certificate(Certificate),
    /// A bare public key.
    PublicKey(PublicKey),
}

impl Credential {
    /// Returns the verification key.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        match self {
            Self::Certificate(cert) => cert.public_key(),
            Self::PublicKey(key) => key,
        }
    }

    /// Returns the certificate, if this credential has one.
    #[must_use]
    pub const fn certificate(&self) -> Option<&Certificate> {
        match self {
            Self::Certificate(cert) => Some(cert),
            Self::PublicKey(_) => None,
        }
    }
}
