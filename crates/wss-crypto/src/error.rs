//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised while handling credential material.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The certificate could not be decoded.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// The key could not be decoded or does not fit the algorithm.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The algorithm URI is unknown or not allowed.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Signature verification failed.
    #[error("signature verification failed")]
    Verification,

    /// Base64 or PEM decoding error.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}
