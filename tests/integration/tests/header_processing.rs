//! Multi-assertion headers and event stream handling.

use wss_crypto::InMemoryTrustStore;
use wss_saml::constants::confirmation_methods::SAML2_BEARER;
use wss_saml::constants::{SAML2_NS, SECURITY, WSSE_NS};
use wss_saml::dom::{QName, StartElement, XmlEvent};
use wss_saml::{
    InMemorySecurityContext, SamlConfig, SamlError, SamlVersion, SecurityEvent, SubjectBean,
};

use crate::common::{assertion, processor, soap_envelope, Party};

#[test]
fn assertions_are_processed_in_order() -> anyhow::Result<()> {
    let mut first = assertion(SamlVersion::V2_0, SubjectBean::new("alice", SAML2_BEARER))?;
    let mut second = assertion(SamlVersion::V1_1, SubjectBean::new("bob", SAML2_BEARER))?;
    let xml = soap_envelope(&[first.to_xml_string(), second.to_xml_string()]);

    let mut context = InMemorySecurityContext::new();
    let ids = processor(SamlConfig::default(), InMemoryTrustStore::new())?
        .process_header_str(&xml, &mut context)?;

    assert_eq!(ids.len(), 2);
    assert_eq!(Some(ids[0].as_str()), first.id());
    assert_eq!(Some(ids[1].as_str()), second.id());
    let versions: Vec<_> = context
        .events()
        .iter()
        .map(|e| match e {
            SecurityEvent::SamlToken { version, .. } => *version,
        })
        .collect();
    assert_eq!(versions, vec![SamlVersion::V2_0, SamlVersion::V1_1]);
    Ok(())
}

#[test]
fn failing_assertion_leaves_earlier_tokens() -> anyhow::Result<()> {
    let sts = Party::generate("sts")?;
    let mut good = assertion(SamlVersion::V2_0, SubjectBean::new("alice", SAML2_BEARER))?;
    let mut bad = assertion(SamlVersion::V2_0, SubjectBean::new("eve", SAML2_BEARER))?;
    sts.signer.sign(&mut bad)?;
    let tampered = bad.to_xml_string().replace(">eve<", ">root<");
    let xml = soap_envelope(&[good.to_xml_string(), tampered]);

    let mut context = InMemorySecurityContext::new();
    let store = InMemoryTrustStore::new().with_certificate("sts", sts.certificate);
    let err = processor(SamlConfig::default(), store)?
        .process_header_str(&xml, &mut context)
        .unwrap_err();

    assert!(err.is_signature_failure());
    assert_eq!(context.len(), 1);
    assert!(context.token(good.id().unwrap_or_default()).is_some());
    Ok(())
}

#[test]
fn body_assertions_are_not_tokens() -> anyhow::Result<()> {
    let mut header = assertion(SamlVersion::V2_0, SubjectBean::new("alice", SAML2_BEARER))?;
    let mut payload = assertion(SamlVersion::V2_0, SubjectBean::new("bob", SAML2_BEARER))?;
    let xml = soap_envelope(&[header.to_xml_string()]).replace(
        r#"<ping xmlns="urn:example:ping"/>"#,
        &payload.to_xml_string(),
    );

    let mut context = InMemorySecurityContext::new();
    let ids = processor(SamlConfig::default(), InMemoryTrustStore::new())?
        .process_header_str(&xml, &mut context)?;

    assert_eq!(ids.len(), 1);
    assert_eq!(Some(ids[0].as_str()), header.id());
    assert!(context.token(payload.id().unwrap_or_default()).is_none());
    Ok(())
}

#[test]
fn dtd_inside_assertion_is_rejected() -> anyhow::Result<()> {
    let processor = processor(SamlConfig::default(), InMemoryTrustStore::new())?;

    let ids = processor.process_header_str("<!DOCTYPE x><x/>", &mut InMemorySecurityContext::new())?;
    assert!(ids.is_empty());

    let events = vec![
        XmlEvent::StartDocument,
        XmlEvent::StartElement(StartElement::new(QName::prefixed(WSSE_NS, "wsse", SECURITY))),
        XmlEvent::StartElement(StartElement::new(QName::prefixed(SAML2_NS, "saml2", "Assertion"))),
        XmlEvent::Dtd("<!DOCTYPE x>".to_string()),
    ];
    let err = processor
        .process_header(events, &mut InMemorySecurityContext::new())
        .unwrap_err();
    assert!(matches!(err, SamlError::Parse(_)));
    Ok(())
}
