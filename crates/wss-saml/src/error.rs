//! SAML error types.
//!
//! Every failure of the assertion pipeline surfaces as a typed
//! [`SamlError`]; [`SamlError::kind`] exposes the taxonomy without the
//! payload.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML processing errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Unsupported or malformed XML event.
    #[error("parse error: {0}")]
    Parse(String),

    /// The element is not a recognised assertion type.
    #[error("unmarshal error: {0}")]
    Unmarshal(String),

    /// The SAML version could not be determined.
    #[error("SAML version indeterminate: {0}")]
    VersionIndeterminate(String),

    /// No certificate or public key could be derived from the key info.
    #[error("cannot get certificate or key: {0}")]
    CredentialResolution(String),

    /// The signature does not follow the SAML signature profile.
    #[error("signature profile violation: {0}")]
    SignatureProfile(String),

    /// Cryptographic verification failed.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// Holder-of-key subject without resolvable key material.
    #[error("no key in SAML token: {0}")]
    MissingKey(String),

    /// Signature verified but the signer is not trusted.
    #[error("untrusted signer: {0}")]
    UntrustedSigner(String),

    /// An unsigned assertion was rejected by configuration.
    #[error("unsigned assertion: {0}")]
    UnsignedAssertion(String),

    /// A token with this identifier is already registered.
    #[error("duplicate security token: {0}")]
    DuplicateToken(String),

    /// XML reader error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Marshalling error.
    #[error("marshal error: {0}")]
    Marshal(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Engine bootstrap failed.
    #[error("SAML engine initialization failed: {0}")]
    EngineInit(String),

    /// Credential material error.
    #[error(transparent)]
    Crypto(#[from] wss_crypto::CryptoError),
}

/// Error discriminant without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlErrorKind {
    /// See [`SamlError::Parse`].
    Parse,
    /// See [`SamlError::Unmarshal`].
    Unmarshal,
    /// See [`SamlError::VersionIndeterminate`].
    VersionIndeterminate,
    /// See [`SamlError::CredentialResolution`].
    CredentialResolution,
    /// See [`SamlError::SignatureProfile`].
    SignatureProfile,
    /// See [`SamlError::SignatureVerification`].
    SignatureVerification,
    /// See [`SamlError::MissingKey`].
    MissingKey,
    /// See [`SamlError::UntrustedSigner`].
    UntrustedSigner,
    /// See [`SamlError::UnsignedAssertion`].
    UnsignedAssertion,
    /// See [`SamlError::DuplicateToken`].
    DuplicateToken,
    /// See [`SamlError::Xml`].
    Xml,
    /// See [`SamlError::Marshal`].
    Marshal,
    /// See [`SamlError::Config`].
    Config,
    /// See [`SamlError::EngineInit`].
    EngineInit,
    /// See [`SamlError::Crypto`].
    Crypto,
}

impl SamlError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> SamlErrorKind {
        match self {
            Self::Parse(_) => SamlErrorKind::Parse,
            Self::Unmarshal(_) => SamlErrorKind::Unmarshal,
            Self::VersionIndeterminate(_) => SamlErrorKind::VersionIndeterminate,
            Self::CredentialResolution(_) => SamlErrorKind::CredentialResolution,
            Self::SignatureProfile(_) => SamlErrorKind::SignatureProfile,
            Self::SignatureVerification(_) => SamlErrorKind::SignatureVerification,
            Self::MissingKey(_) => SamlErrorKind::MissingKey,
            Self::UntrustedSigner(_) => SamlErrorKind::UntrustedSigner,
            Self::UnsignedAssertion(_) => SamlErrorKind::UnsignedAssertion,
            Self::DuplicateToken(_) => SamlErrorKind::DuplicateToken,
            Self::Xml(_) => SamlErrorKind::Xml,
            Self::Marshal(_) => SamlErrorKind::Marshal,
            Self::Config(_) => SamlErrorKind::Config,
            Self::EngineInit(_) => SamlErrorKind::EngineInit,
            Self::Crypto(_) => SamlErrorKind::Crypto,
        }
    }

    /// Returns true for failures of the signature trust chain
    /// (credential resolution, profile, cryptographic check, trust).
    #[must_use]
    pub const fn is_signature_failure(&self) -> bool {
        matches!(
            self.kind(),
            SamlErrorKind::CredentialResolution
                | SamlErrorKind::SignatureProfile
                | SamlErrorKind::SignatureVerification
                | SamlErrorKind::UntrustedSigner
        )
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Parse(format!("base64 decode error: {err}"))
    }
}
