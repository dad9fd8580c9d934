//! SAML assertion types for both schema families.

mod assertion;
mod bean;
mod builder;
mod common;
pub mod constants;
pub mod saml1;
pub mod saml2;

pub use assertion::{
    AssertionModel, Marshalable, SamlAssertion, SamlVersion, Signable, VersionedAssertion,
};
pub use bean::{
    ActionBean, AssertionParams, AttributeBean, AttributeStatementBean, AuthDecisionStatementBean,
    AuthenticationStatementBean, CertIdentifier, ConditionsBean, KeyInfoBean, SamlCallback,
    SamlCallbackHandler, SubjectBean,
};
pub use common::{Action, Decision, NameId};
pub use constants::{is_method_holder_of_key, is_method_sender_vouches};
