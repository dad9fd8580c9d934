//! XML-DSig algorithm identifiers.
//!
//! Maps the algorithm URIs carried in `ds:DigestMethod` and
//! `ds:SignatureMethod` to the primitives aws-lc-rs provides.

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};

/// Digest algorithm URIs.
pub mod digest_uris {
    /// SHA-1 (legacy).
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
    /// SHA-256.
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    /// SHA-384.
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
    /// SHA-512.
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";
}

/// Signature algorithm URIs.
pub mod signature_uris {
    /// RSA PKCS#1 v1.5 with SHA-1 (legacy).
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    /// RSA PKCS#1 v1.5 with SHA-256.
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    /// RSA PKCS#1 v1.5 with SHA-384.
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
    /// RSA PKCS#1 v1.5 with SHA-512.
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
    /// ECDSA with SHA-256.
    pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
    /// ECDSA with SHA-384.
    pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";
    /// ECDSA with SHA-512.
    pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";
}

/// Digest algorithms usable in `ds:Reference` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-1 (deprecated).
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the URI for this algorithm.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Sha1 => digest_uris::SHA1,
            Self::Sha256 => digest_uris::SHA256,
            Self::Sha384 => digest_uris::SHA384,
            Self::Sha512 => digest_uris::SHA512,
        }
    }

    /// Parses a digest algorithm from its URI.
    pub fn from_uri(uri: &str) -> CryptoResult<Self> {
        match uri {
            digest_uris::SHA1 => Ok(Self::Sha1),
            digest_uris::SHA256 => Ok(Self::Sha256),
            digest_uris::SHA384 => Ok(Self::Sha384),
            digest_uris::SHA512 => Ok(Self::Sha512),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Returns true for SHA-1.
    #[must_use]
    pub const fn is_deprecated(self) -> bool {
        matches!(self, Self::Sha1)
    }
}

/// Signature algorithms usable in `ds:SignatureMethod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-1 (deprecated).
    RsaSha1,
    /// RSA with SHA-256.
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    RsaSha512,
    /// ECDSA with SHA-256.
    EcdsaSha256,
    /// ECDSA with SHA-384.
    EcdsaSha384,
    /// ECDSA with SHA-512.
    EcdsaSha512,
}

impl SignatureAlgorithm {
    /// Returns the URI for this algorithm.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaSha1 => signature_uris::RSA_SHA1,
            Self::RsaSha256 => signature_uris::RSA_SHA256,
            Self::RsaSha384 => signature_uris::RSA_SHA384,
            Self::RsaSha512 => signature_uris::RSA_SHA512,
            Self::EcdsaSha256 => signature_uris::ECDSA_SHA256,
            Self::EcdsaSha384 => signature_uris::ECDSA_SHA384,
            Self::EcdsaSha512 => signature_uris::ECDSA_SHA512,
        }
    }

    /// Parses a signature algorithm from its URI.
    pub fn from_uri(uri: &str) -> CryptoResult<Self> {
        match uri {
            signature_uris::RSA_SHA1 => Ok(Self::RsaSha1),
            signature_uris::RSA_SHA256 => Ok(Self::RsaSha256),
            signature_uris::RSA_SHA384 => Ok(Self::RsaSha384),
            signature_uris::RSA_SHA512 => Ok(Self::RsaSha512),
            signature_uris::ECDSA_SHA256 => Ok(Self::EcdsaSha256),
            signature_uris::ECDSA_SHA384 => Ok(Self::EcdsaSha384),
            signature_uris::ECDSA_SHA512 => Ok(Self::EcdsaSha512),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Returns the digest algorithm paired with this signature algorithm.
    #[must_use]
    pub const fn digest(self) -> DigestAlgorithm {
        match self {
            Self::RsaSha1 => DigestAlgorithm::Sha1,
            Self::RsaSha256 | Self::EcdsaSha256 => DigestAlgorithm::Sha256,
            Self::RsaSha384 | Self::EcdsaSha384 => DigestAlgorithm::Sha384,
            Self::RsaSha512 | Self::EcdsaSha512 => DigestAlgorithm::Sha512,
        }
    }

    /// Returns true if this algorithm uses RSA.
    #[must_use]
    pub const fn is_rsa(self) -> bool {
        matches!(
            self,
            Self::RsaSha1 | Self::RsaSha256 | Self::RsaSha384 | Self::RsaSha512
        )
    }

    /// Returns true if this algorithm uses a deprecated hash (SHA-1).
    #[must_use]
    pub const fn is_deprecated(self) -> bool {
        matches!(self, Self::RsaSha1)
    }
}
