//! Security tokens and the context they are registered in.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use wss_crypto::{KeyInfo, TrustStore};

use crate::error::{SamlError, SamlResult};
use crate::types::{SamlAssertion, SamlVersion};

/// A processed SAML assertion as seen by the rest of the security header.
#[derive(Clone)]
pub struct SecurityToken {
    id: String,
    version: SamlVersion,
    issuer: Option<String>,
    subject_key_info: Option<Arc<KeyInfo>>,
    signature_key_info: Option<Arc<KeyInfo>>,
    trust_store: Arc<dyn TrustStore>,
}

impl SecurityToken {
    /// Creates a token for `assertion`, assigning it an ID if needed.
    pub fn from_assertion(assertion: &mut SamlAssertion, trust_store: Arc<dyn TrustStore>) -> Self {
        let id = assertion.ensure_id().to_string();
        Self {
            id,
            version: assertion.version(),
            issuer: assertion.issuer_string().map(str::to_string),
            subject_key_info: assertion.subject_key_info().cloned(),
            signature_key_info: assertion.signature_key_info().cloned(),
            trust_store,
        }
    }

    /// Returns the token identifier (the assertion ID).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the SAML version.
    pub const fn version(&self) -> SamlVersion {
        self.version
    }

    /// Returns the assertion issuer.
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Returns the holder-of-key subject key.
    pub fn subject_key_info(&self) -> Option<&Arc<KeyInfo>> {
        self.subject_key_info.as_ref()
    }

    /// Returns the key that verified the assertion signature.
    pub fn signature_key_info(&self) -> Option<&Arc<KeyInfo>> {
        self.signature_key_info.as_ref()
    }

    /// Returns the trust store the token was processed with.
    pub fn trust_store(&self) -> &Arc<dyn TrustStore> {
        &self.trust_store
    }
}

impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityToken")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("issuer", &self.issuer)
            .field("subject_key_info", &self.subject_key_info)
            .field("signature_key_info", &self.signature_key_info)
            .finish_non_exhaustive()
    }
}

/// Events emitted while processing a security header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A SAML assertion was accepted.
    SamlToken {
        /// Assertion issuer.
        issuer: Option<String>,
        /// SAML version.
        version: SamlVersion,
        /// Registered token ID.
        token_id: String,
    },
}

/// Registry of tokens and events for one message.
///
/// Implementations are not required to synchronize; a context shared
/// between threads needs external locking.
pub trait SecurityContext {
    /// Registers a token. Fails with [`SamlError::DuplicateToken`] if the
    /// ID is taken.
    fn register_token(&mut self, token: SecurityToken) -> SamlResult<()>;

    /// Records an event.
    fn register_event(&mut self, event: SecurityEvent);
}

/// In-memory [`SecurityContext`].
#[derive(Debug, Default)]
pub struct InMemorySecurityContext {
    tokens: HashMap<String, SecurityToken>,
    order: Vec<String>,
    events: Vec<SecurityEvent>,
}

impl InMemorySecurityContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a token by ID.
    pub fn token(&self, id: &str) -> Option<&SecurityToken> {
        self.tokens.get(id)
    }

    /// Returns tokens in registration order.
    pub fn tokens(&self) -> impl Iterator<Item = &SecurityToken> {
        self.order.iter().filter_map(|id| self.tokens.get(id))
    }

    /// Returns recorded events in order.
    pub fn events(&self) -> &[SecurityEvent] {
        &self.events
    }

    /// Returns the number of registered tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if no token is registered.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl SecurityContext for InMemorySecurityContext {
    fn register_token(&mut self, token: SecurityToken) -> SamlResult<()> {
        if self.tokens.contains_key(token.id()) {
            return Err(SamlError::DuplicateToken(token.id().to_string()));
        }
        self.order.push(token.id().to_string());
        self.tokens.insert(token.id().to_string(), token);
        Ok(())
    }

    fn register_event(&mut self, event: SecurityEvent) {
        self.events.push(event);
    }
}
