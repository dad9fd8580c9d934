//! # wss-saml
//!
//! SAML 1.1 and 2.0 assertion handling for WS-Security headers.
//!
//! The crate turns assertions found in a security header into registered
//! security tokens:
//!
//! - **Streaming DOM construction** - build an element tree from pull-parser
//!   events, stopping at the end of the assertion
//! - **Version-independent assertion model** - one wrapper over the SAML 1.1
//!   and 2.0 object models, with parsing, building and marshalling
//! - **Signature verification** - credential resolution, the SAML signature
//!   profile and XML-DSig verification, plus enveloped signing
//! - **Holder-of-key** - subject key extraction from subject confirmations
//! - **Token registration** - security tokens and events in a caller-owned
//!   context
//!
//! # Architecture
//!
//! - [`dom`] - element tree, event reader/writer and the streaming builder
//! - [`types`] - SAML object models, builder beans and [`SamlAssertion`]
//! - [`signature`] - signature model, profile, engine, signer and verifier
//! - [`credential`] - key info to credential resolution
//! - [`subject`] - holder-of-key subject confirmation
//! - [`token`] / [`processor`] - token registration and the header pipeline
//! - [`engine`] - process-wide engine bootstrap
//! - [`config`] / [`error`] - configuration and error types
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wss_crypto::InMemoryTrustStore;
//! use wss_saml::{init_saml_engine, InMemorySecurityContext, SamlConfig, SamlTokenProcessor};
//!
//! let engine = init_saml_engine(SamlConfig::load("wss-saml.toml")?)?;
//! let processor = SamlTokenProcessor::new(engine, Arc::new(InMemoryTrustStore::new()));
//! let mut context = InMemorySecurityContext::new();
//! let token_ids = processor.process_header_str(&security_header_xml, &mut context)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credential;
pub mod dom;
pub mod engine;
pub mod error;
pub mod processor;
pub mod signature;
pub mod subject;
pub mod token;
pub mod types;

pub use config::SamlConfig;
pub use credential::{CredentialResolver, KeyInfoCredentialResolver};
pub use engine::{init_saml_engine, retry_saml_engine_init, saml_engine, EngineCell, SamlEngine};
pub use error::{SamlError, SamlErrorKind, SamlResult};
pub use processor::SamlTokenProcessor;
pub use signature::{
    AssertionSigner, C14nContext, Canonicalizer, SamlSignatureProfileValidator, Signature,
    SignatureEngine, SignatureProfileValidator, SignatureTrustVerifier, XmlCanonicalizer,
    XmlDsigEngine,
};
pub use subject::{KeyInfoSubjectKeyExtractor, SubjectConfirmationResolver, SubjectKeyExtractor};
pub use token::{InMemorySecurityContext, SecurityContext, SecurityEvent, SecurityToken};
pub use types::*;
