//! Trust store and key callback contracts.
//!
//! A [`TrustStore`] is the caller-supplied keystore handle that credential
//! resolution consults for certificates referenced by name or by
//! issuer/serial, and that signature trust is checked against. Lookups may
//! block on I/O in real implementations.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::certificate::{Certificate, PublicKey};

/// Keystore collaborator.
pub trait TrustStore: Send + Sync + fmt::Debug {
    /// Returns the certificate chain stored under `alias`.
    fn certificates(&self, alias: &str) -> Option<Vec<Certificate>>;

    /// Finds a certificate by issuer distinguished name and decimal serial.
    fn certificate_by_issuer_serial(&self, issuer: &str, serial: &str) -> Option<Certificate>;

    /// Returns true if this certificate is directly trusted.
    fn is_trusted_certificate(&self, certificate: &Certificate) -> bool;

    /// Returns true if this bare public key is trusted.
    fn is_trusted_public_key(&self, public_key: &PublicKey) -> bool;
}

/// Application callback that supplies secret keys by name.
pub trait KeyCallback: Send + Sync {
    /// Returns the secret key registered for `key_name`.
    fn secret_key(&self, key_name: &str) -> Option<Vec<u8>>;
}

/// In-memory trust store.
#[derive(Debug, Default)]
pub struct InMemoryTrustStore {
    entries: RwLock<HashMap<String, Vec<Certificate>>>,
    public_keys: RwLock<Vec<PublicKey>>,
}

impl InMemoryTrustStore {
    /// Creates an empty trust store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a certificate under `alias`.
    #[must_use]
    pub fn with_certificate(self, alias: impl Into<String>, certificate: Certificate) -> Self {
        self.add_certificate(alias, certificate);
        self
    }

    /// Adds a certificate under `alias`, appending to any existing chain.
    pub fn add_certificate(&self, alias: impl Into<String>, certificate: Certificate) {
        self.entries
            .write()
            .entry(alias.into())
            .or_default()
            .push(certificate);
    }

    /// Trusts a bare public key.
    pub fn add_public_key(&self, public_key: PublicKey) {
        self.public_keys.write().push(public_key);
    }

    /// Returns the number of aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no aliases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl TrustStore for InMemoryTrustStore {
    fn certificates(&self, alias: &str) -> Option<Vec<Certificate>> {
        self.entries.read().get(alias).cloned()
    }

    fn certificate_by_issuer_serial(&self, issuer: &str, serial: &str) -> Option<Certificate> {
        self.entries
            .read()
            .values()
            .flatten()
            .find(|c| c.issuer() == issuer && c.serial() == serial)
            .cloned()
    }

    fn is_trusted_certificate(&self, certificate: &Certificate) -> bool {
        self.entries
            .read()
            .values()
            .flatten()
            .any(|c| c == certificate)
    }

    fn is_trusted_public_key(&self, public_key: &PublicKey) -> bool {
        self.public_keys.read().iter().any(|k| k == public_key)
            || self
                .entries
                .read()
                .values()
                .flatten()
                .any(|c| c.public_key() == public_key)
    }
}

/// Key callback backed by a fixed map.
#[derive(Default)]
pub struct StaticKeyCallback {
    keys: HashMap<String, Vec<u8>>,
}

impl StaticKeyCallback {
    /// Creates an empty callback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a secret key under `key_name`.
    #[must_use]
    pub fn with_key(mut self, key_name: impl Into<String>, key: Vec<u8>) -> Self {
        self.keys.insert(key_name.into(), key);
        self
    }
}

impl KeyCallback for StaticKeyCallback {
    fn secret_key(&self, key_name: &str) -> Option<Vec<u8>> {
        self.keys.get(key_name).cloned()
    }
}

impl fmt::Debug for StaticKeyCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyCallback")
            .field("names", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}
