//! Common test utilities and fixtures.

use std::sync::Arc;

use wss_crypto::{Certificate, InMemoryTrustStore, SignatureAlgorithm, SigningKey};
use wss_saml::{
    AssertionSigner, SamlAssertion, SamlCallback, SamlConfig, SamlEngine, SamlTokenProcessor,
    SamlVersion, SubjectBean,
};

/// Issuer URI used by every fixture assertion.
pub const ISSUER: &str = "https://sts.example.org";

const SECURITY_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// A signing party with its certificate.
pub struct Party {
    /// Signer holding the private key and certificate.
    pub signer: AssertionSigner,
    /// The party's certificate.
    pub certificate: Certificate,
}

impl Party {
    /// Generates a self-signed P-256 identity.
    pub fn generate(name: &str) -> anyhow::Result<Self> {
        let certified = rcgen::generate_simple_self_signed(vec![name.to_string()])?;
        let key = SigningKey::from_pkcs8(
            &certified.key_pair.serialize_der(),
            SignatureAlgorithm::EcdsaSha256,
        )?;
        let certificate = Certificate::from_der(certified.cert.der())?;
        Ok(Self {
            signer: AssertionSigner::new(key).with_certificate(certificate.clone()),
            certificate,
        })
    }
}

/// Installs a test subscriber once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("wss_saml=debug")
        .with_test_writer()
        .try_init();
}

/// Builds an unsigned assertion for `subject`.
pub fn assertion(version: SamlVersion, subject: SubjectBean) -> anyhow::Result<SamlAssertion> {
    let callback = SamlCallback {
        subject: Some(subject),
        ..SamlCallback::default()
    };
    Ok(SamlAssertion::build(version, ISSUER, &callback)?)
}

/// Creates a processor over `store` with `config`.
pub fn processor(config: SamlConfig, store: InMemoryTrustStore) -> anyhow::Result<SamlTokenProcessor> {
    init_tracing();
    let engine = Arc::new(SamlEngine::new(config)?);
    Ok(SamlTokenProcessor::new(engine, Arc::new(store)))
}

/// Wraps serialized assertions in a SOAP envelope security header.
pub fn soap_envelope(assertions: &[String]) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Header><wsse:Security xmlns:wsse="{SECURITY_NS}">{}</wsse:Security></soap:Header><soap:Body><ping xmlns="urn:example:ping"/></soap:Body></soap:Envelope>"#,
        assertions.concat()
    )
}
