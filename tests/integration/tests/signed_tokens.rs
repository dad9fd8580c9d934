//! Signed assertion verification through the token processor.

use wss_crypto::InMemoryTrustStore;
use wss_saml::constants::confirmation_methods::{SAML1_SENDER_VOUCHES, SAML2_BEARER};
use wss_saml::{
    AuthenticationStatementBean, InMemorySecurityContext, SamlConfig, SamlError, SamlVersion,
    SubjectBean,
};

use crate::common::{assertion, processor, soap_envelope, Party, ISSUER};

#[test]
fn signed_saml2_assertion_registers_token() -> anyhow::Result<()> {
    let sts = Party::generate("sts")?;
    let mut token = assertion(SamlVersion::V2_0, SubjectBean::new("alice", SAML2_BEARER))?;
    sts.signer.sign(&mut token)?;
    let id = token.id().unwrap_or_default().to_string();

    let store = InMemoryTrustStore::new().with_certificate("sts", sts.certificate.clone());
    let mut context = InMemorySecurityContext::new();
    let ids = processor(SamlConfig::default(), store)?
        .process_header_str(&soap_envelope(&[token.to_xml_string()]), &mut context)?;

    assert_eq!(ids, vec![id.clone()]);
    let registered = context.token(&id).expect("token registered");
    assert_eq!(registered.issuer(), Some(ISSUER));
    assert_eq!(
        registered.signature_key_info().map(|k| k.certificates().to_vec()),
        Some(vec![sts.certificate])
    );
    Ok(())
}

#[test]
fn signed_saml1_assertion_registers_token() -> anyhow::Result<()> {
    let sts = Party::generate("sts")?;
    let callback = wss_saml::SamlCallback {
        subject: Some(SubjectBean::new("bob", SAML1_SENDER_VOUCHES)),
        authentication_statements: vec![AuthenticationStatementBean::default()],
        ..wss_saml::SamlCallback::default()
    };
    let mut token = wss_saml::SamlAssertion::build(SamlVersion::V1_1, ISSUER, &callback)?;
    sts.signer.sign(&mut token)?;

    let store = InMemoryTrustStore::new().with_certificate("sts", sts.certificate);
    let mut context = InMemorySecurityContext::new();
    processor(SamlConfig::default(), store)?
        .process_header_str(&soap_envelope(&[token.to_xml_string()]), &mut context)?;

    let registered = context.tokens().next().expect("token registered");
    assert_eq!(registered.version(), SamlVersion::V1_1);
    Ok(())
}

#[test]
fn tampered_assertion_fails_verification() -> anyhow::Result<()> {
    let sts = Party::generate("sts")?;
    let mut token = assertion(SamlVersion::V2_0, SubjectBean::new("alice", SAML2_BEARER))?;
    sts.signer.sign(&mut token)?;
    let xml = token.to_xml_string().replace(">alice<", ">mallory<");

    let store = InMemoryTrustStore::new().with_certificate("sts", sts.certificate);
    let mut context = InMemorySecurityContext::new();
    let err = processor(SamlConfig::default(), store)?
        .process_header_str(&soap_envelope(&[xml]), &mut context)
        .unwrap_err();

    assert!(matches!(err, SamlError::SignatureVerification(_)));
    assert!(context.is_empty());
    Ok(())
}

#[test]
fn signer_outside_trust_store_is_rejected() -> anyhow::Result<()> {
    let sts = Party::generate("sts")?;
    let other = Party::generate("other")?;
    let mut token = assertion(SamlVersion::V2_0, SubjectBean::new("alice", SAML2_BEARER))?;
    sts.signer.sign(&mut token)?;

    let store = InMemoryTrustStore::new().with_certificate("other", other.certificate);
    let err = processor(SamlConfig::default(), store)?
        .process_header_str(
            &soap_envelope(&[token.to_xml_string()]),
            &mut InMemorySecurityContext::new(),
        )
        .unwrap_err();
    assert!(matches!(err, SamlError::UntrustedSigner(_)));
    assert!(err.is_signature_failure());
    Ok(())
}
