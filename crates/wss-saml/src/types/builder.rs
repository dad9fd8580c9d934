//! Assembles version-specific assertions from callback beans.

use chrono::{DateTime, Utc};

use super::bean::{
    AttributeBean, AuthDecisionStatementBean, AuthenticationStatementBean, ConditionsBean,
    SamlCallback, SubjectBean,
};
use super::common::{Action, NameId};
use super::{saml1, saml2};
use crate::error::SamlResult;

/// Generates a fresh assertion identifier.
pub(crate) fn new_assertion_id() -> String {
    format!("_id{}", uuid::Uuid::new_v4().simple())
}

fn name_id(bean: &SubjectBean) -> NameId {
    NameId {
        value: bean.name.clone(),
        format: bean.name_format.clone(),
        name_qualifier: bean.name_qualifier.clone(),
        sp_name_qualifier: None,
    }
}

fn actions(beans: &AuthDecisionStatementBean) -> Vec<Action> {
    beans
        .actions
        .iter()
        .map(|a| Action {
            namespace: a.namespace.clone(),
            value: a.contents.clone(),
        })
        .collect()
}

/// Builds a SAML 1.1 assertion.
///
/// Statements without their own subject use the callback subject.
pub(crate) fn saml1_assertion(
    issuer: &str,
    callback: &SamlCallback,
    now: DateTime<Utc>,
) -> SamlResult<saml1::Assertion> {
    let subject_for = |own: &Option<SubjectBean>| -> SamlResult<Option<saml1::Subject>> {
        own.as_ref()
            .or(callback.subject.as_ref())
            .map(saml1_subject)
            .transpose()
    };

    let conditions = callback.conditions.as_ref().map(|c| saml1_conditions(c, now));

    let authentication_statements = callback
        .authentication_statements
        .iter()
        .map(|bean: &AuthenticationStatementBean| -> SamlResult<_> {
            Ok(saml1::AuthenticationStatement {
                subject: subject_for(&bean.subject)?,
                method: bean.authentication_method.clone(),
                instant: Some(bean.authentication_instant.unwrap_or(now)),
                ip_address: bean.subject_locality_ip.clone(),
                dns_address: bean.subject_locality_dns.clone(),
            })
        })
        .collect::<SamlResult<Vec<_>>>()?;

    let attribute_statements = callback
        .attribute_statements
        .iter()
        .map(|bean| -> SamlResult<_> {
            Ok(saml1::AttributeStatement {
                subject: subject_for(&bean.subject)?,
                attributes: bean.attributes.iter().map(saml1_attribute).collect(),
            })
        })
        .collect::<SamlResult<Vec<_>>>()?;

    let authorization_decision_statements = callback
        .auth_decision_statements
        .iter()
        .map(|bean| -> SamlResult<_> {
            Ok(saml1::AuthorizationDecisionStatement {
                subject: subject_for(&bean.subject)?,
                resource: bean.resource.clone(),
                decision: bean.decision,
                actions: actions(bean),
            })
        })
        .collect::<SamlResult<Vec<_>>>()?;

    Ok(saml1::Assertion {
        id: Some(new_assertion_id()),
        issuer: Some(issuer.to_string()),
        issue_instant: Some(now),
        minor_version: 1,
        conditions,
        subject_statements: Vec::new(),
        authentication_statements,
        attribute_statements,
        authorization_decision_statements,
        signature: None,
        signed: false,
    })
}

fn saml1_subject(bean: &SubjectBean) -> SamlResult<saml1::Subject> {
    let key_info = bean.key_info.as_ref().map(|k| k.to_element()).transpose()?;
    let confirmation = (bean.confirmation_method.is_some() || key_info.is_some()).then(|| {
        saml1::SubjectConfirmation {
            methods: bean.confirmation_method.iter().cloned().collect(),
            data_method: None,
            key_info,
        }
    });
    Ok(saml1::Subject {
        name_identifier: Some(name_id(bean)),
        confirmation,
    })
}

fn saml1_conditions(bean: &ConditionsBean, now: DateTime<Utc>) -> saml1::Conditions {
    let (not_before, not_on_or_after) = bean.validity(now);
    saml1::Conditions {
        not_before,
        not_on_or_after,
        audience_restrictions: audiences(bean),
    }
}

fn saml1_attribute(bean: &AttributeBean) -> saml1::Attribute {
    saml1::Attribute {
        name: bean.name.clone(),
        namespace: bean.name_format.clone(),
        values: bean.values.clone(),
    }
}

fn audiences(bean: &ConditionsBean) -> Vec<Vec<String>> {
    if bean.audience_uris.is_empty() {
        Vec::new()
    } else {
        vec![bean.audience_uris.clone()]
    }
}

/// Builds a SAML 2.0 assertion.
pub(crate) fn saml2_assertion(
    issuer: &str,
    callback: &SamlCallback,
    now: DateTime<Utc>,
) -> SamlResult<saml2::Assertion> {
    let subject = callback.subject.as_ref().map(saml2_subject).transpose()?;
    let conditions = callback.conditions.as_ref().map(|c| {
        let (not_before, not_on_or_after) = c.validity(now);
        saml2::Conditions {
            not_before,
            not_on_or_after,
            audience_restrictions: audiences(c),
            one_time_use: false,
        }
    });

    let authn_statements = callback
        .authentication_statements
        .iter()
        .map(|bean| saml2::AuthnStatement {
            authn_instant: Some(bean.authentication_instant.unwrap_or(now)),
            session_index: bean.session_index.clone(),
            session_not_on_or_after: None,
            context_class_ref: bean.authentication_method.clone(),
            locality_address: bean.subject_locality_ip.clone(),
            locality_dns_name: bean.subject_locality_dns.clone(),
        })
        .collect();

    let attribute_statements = callback
        .attribute_statements
        .iter()
        .map(|bean| saml2::AttributeStatement {
            attributes: bean
                .attributes
                .iter()
                .map(|a| saml2::Attribute {
                    name: a.name.clone(),
                    name_format: a.name_format.clone(),
                    friendly_name: a.friendly_name.clone(),
                    values: a.values.clone(),
                })
                .collect(),
        })
        .collect();

    let authz_decision_statements = callback
        .auth_decision_statements
        .iter()
        .map(|bean| saml2::AuthzDecisionStatement {
            resource: bean.resource.clone(),
            decision: bean.decision,
            actions: actions(bean),
        })
        .collect();

    Ok(saml2::Assertion {
        id: Some(new_assertion_id()),
        issue_instant: Some(now),
        issuer: Some(saml2::Issuer {
            value: issuer.to_string(),
            format: None,
        }),
        subject,
        conditions,
        authn_statements,
        attribute_statements,
        authz_decision_statements,
        signature: None,
        signed: false,
    })
}

fn saml2_subject(bean: &SubjectBean) -> SamlResult<saml2::Subject> {
    let key_infos = bean
        .key_info
        .as_ref()
        .map(|k| k.to_element())
        .transpose()?
        .into_iter()
        .collect::<Vec<_>>();
    let confirmations = bean
        .confirmation_method
        .iter()
        .map(|method| saml2::SubjectConfirmation {
            method: method.clone(),
            data: (!key_infos.is_empty()).then(|| saml2::SubjectConfirmationData {
                key_infos: key_infos.clone(),
                ..Default::default()
            }),
        })
        .collect();
    Ok(saml2::Subject {
        name_id: Some(name_id(bean)),
        confirmations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::bean::{AttributeStatementBean, KeyInfoBean};
    use crate::types::constants::confirmation_methods::{SAML1_SENDER_VOUCHES, SAML2_HOLDER_OF_KEY};
    use crate::types::constants::DSIG_NS;

    fn callback() -> SamlCallback {
        SamlCallback {
            subject: Some(
                SubjectBean::new("alice", SAML2_HOLDER_OF_KEY)
                    .with_key_info(KeyInfoBean::from_key_name("alice-key")),
            ),
            authentication_statements: vec![AuthenticationStatementBean::default()],
            attribute_statements: vec![AttributeStatementBean {
                subject: Some(SubjectBean::new("svc", SAML1_SENDER_VOUCHES)),
                attributes: vec![AttributeBean::new("role", vec!["admin".to_string()])],
            }],
            auth_decision_statements: Vec::new(),
            conditions: Some(ConditionsBean {
                token_period_minutes: Some(5),
                audience_uris: vec!["urn:sp".to_string()],
                ..Default::default()
            }),
        }
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_assertion_id(), new_assertion_id());
        assert!(new_assertion_id().starts_with("_id"));
    }

    #[test]
    fn saml1_statements_fall_back_to_callback_subject() {
        let assertion = saml1_assertion("idp", &callback(), Utc::now()).unwrap();
        assert_eq!(
            assertion.confirmation_methods(),
            vec![SAML2_HOLDER_OF_KEY, SAML1_SENDER_VOUCHES]
        );
        let authn_subject = assertion.authentication_statements[0].subject.as_ref().unwrap();
        assert!(authn_subject.confirmation.as_ref().unwrap().key_info.is_some());
        assert_eq!(
            assertion.conditions.unwrap().audience_restrictions,
            vec![vec!["urn:sp".to_string()]]
        );
    }

    #[test]
    fn saml2_subject_carries_key_info() {
        let assertion = saml2_assertion("idp", &callback(), Utc::now()).unwrap();
        assert_eq!(assertion.issuer_value(), Some("idp"));
        let data = assertion.subject.as_ref().unwrap().confirmations[0].data.as_ref().unwrap();
        assert!(data.key_infos[0].is(DSIG_NS, "KeyInfo"));
        assert_eq!(assertion.attribute_statements[0].attributes[0].values, vec!["admin"]);
    }

    #[test]
    fn empty_descriptor_lists_build_empty_assertions() {
        let assertion = saml2_assertion("idp", &SamlCallback::default(), Utc::now()).unwrap();
        assert!(assertion.subject.is_none());
        assert!(assertion.authn_statements.is_empty());
        assert!(assertion.conditions.is_none());
    }
}
