//! Holder-of-key subject confirmation end to end.

use std::sync::Arc;

use wss_crypto::{InMemoryTrustStore, StaticKeyCallback};
use wss_saml::constants::confirmation_methods::SAML2_HOLDER_OF_KEY;
use wss_saml::{
    InMemorySecurityContext, KeyInfoBean, SamlConfig, SamlError, SamlVersion, SubjectBean,
};

use crate::common::{assertion, processor, soap_envelope, Party};

#[test]
fn subject_certificate_is_bound_to_token() -> anyhow::Result<()> {
    let sts = Party::generate("sts")?;
    let client = Party::generate("client")?;
    let mut token = assertion(
        SamlVersion::V2_0,
        SubjectBean::new("alice", SAML2_HOLDER_OF_KEY)
            .with_key_info(KeyInfoBean::from_certificate(client.certificate.clone())),
    )?;
    sts.signer.sign(&mut token)?;
    let id = token.id().unwrap_or_default().to_string();

    let store = InMemoryTrustStore::new().with_certificate("sts", sts.certificate);
    let mut context = InMemorySecurityContext::new();
    processor(SamlConfig::default(), store)?
        .process_header_str(&soap_envelope(&[token.to_xml_string()]), &mut context)?;

    let subject_key = context
        .token(&id)
        .and_then(|t| t.subject_key_info().cloned())
        .expect("subject key");
    assert_eq!(subject_key.certificates(), &[client.certificate]);
    Ok(())
}

#[test]
fn key_name_resolved_through_callback() -> anyhow::Result<()> {
    let mut token = assertion(
        SamlVersion::V2_0,
        SubjectBean::new("alice", SAML2_HOLDER_OF_KEY)
            .with_key_info(KeyInfoBean::from_key_name("proof-key")),
    )?;
    let callback = StaticKeyCallback::new().with_key("proof-key", vec![0x42; 16]);

    let mut context = InMemorySecurityContext::new();
    let processed = processor(SamlConfig::default(), InMemoryTrustStore::new())?
        .with_key_callback(Arc::new(callback))
        .process_header_str(&soap_envelope(&[token.to_xml_string()]), &mut context)?;

    let key = context
        .token(&processed[0])
        .and_then(|t| t.subject_key_info().cloned())
        .expect("subject key");
    assert_eq!(key.secret(), Some(&[0x42u8; 16][..]));
    Ok(())
}

#[test]
fn holder_of_key_without_key_material_fails() -> anyhow::Result<()> {
    let mut token = assertion(
        SamlVersion::V2_0,
        SubjectBean::new("alice", SAML2_HOLDER_OF_KEY)
            .with_key_info(KeyInfoBean::from_key_name("nobody-knows")),
    )?;

    let err = processor(SamlConfig::default(), InMemoryTrustStore::new())?
        .process_header_str(
            &soap_envelope(&[token.to_xml_string()]),
            &mut InMemorySecurityContext::new(),
        )
        .unwrap_err();
    assert!(matches!(err, SamlError::MissingKey(_)));
    Ok(())
}
