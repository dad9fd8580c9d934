//! End-to-end tests for SAML token processing.
//!
//! Assertions are built and signed with freshly generated P-256
//! certificates, serialized into SOAP security headers and pushed back
//! through the event-driven processing pipeline.

mod common;
mod engine_bootstrap;
mod header_processing;
mod holder_of_key;
mod signed_tokens;
