//! Process-wide engine bootstrap.

use std::sync::Arc;

use wss_saml::constants::confirmation_methods::SAML2_BEARER;
use wss_saml::{
    init_saml_engine, saml_engine, EngineCell, SamlAssertion, SamlConfig, SamlVersion, SubjectBean,
};

use crate::common::assertion;

#[test]
fn global_engine_initializes_once() -> anyhow::Result<()> {
    let first = init_saml_engine(SamlConfig::default())?;
    let second = saml_engine()?;
    assert!(Arc::ptr_eq(&first, &second));

    let mut built = assertion(SamlVersion::V2_0, SubjectBean::new("alice", SAML2_BEARER))?;
    let parsed = SamlAssertion::parse_str(&built.to_xml_string())?;
    assert_eq!(parsed.id(), built.id());
    Ok(())
}

#[test]
fn failed_bootstrap_is_sticky_until_retry() {
    let cell = EngineCell::new();
    let broken = SamlConfig {
        max_element_depth: 0,
        ..SamlConfig::default()
    };

    assert!(cell.get_or_init(broken).is_err());
    assert!(cell.get_or_init(SamlConfig::default()).is_err());
    assert!(cell.get().is_none());

    let engine = cell.retry(SamlConfig::default()).expect("retry succeeds");
    let again = cell.get_or_init(SamlConfig::default()).expect("ready");
    assert!(Arc::ptr_eq(&engine, &again));
}
