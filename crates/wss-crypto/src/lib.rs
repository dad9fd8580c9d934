//! # wss-crypto
//!
//! Credential material and cryptographic primitives for WS-Security SAML
//! processing, built on aws-lc-rs and x509-parser.
//!
//! - [`certificate`] - X.509 certificate and public key extraction (single
//!   certificate only, no path building)
//! - [`key_info`] - resolved credential material handed between stages
//! - [`trust`] - trust store and key callback collaborator contracts
//! - [`algorithm`] - XML-DSig digest and signature algorithm URIs
//! - [`hash`] / [`signature`] - digest, verification and signing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod certificate;
pub mod error;
pub mod hash;
pub mod key_info;
pub mod signature;
pub mod trust;

pub use algorithm::{DigestAlgorithm, SignatureAlgorithm};
pub use certificate::{pem_to_der, Certificate, KeyAlgorithm, PublicKey};
pub use error::{CryptoError, CryptoResult};
pub use hash::digest;
pub use key_info::{Credential, KeyInfo};
pub use signature::{verify_signature, SigningKey};
pub use trust::{InMemoryTrustStore, KeyCallback, StaticKeyCallback, TrustStore};
