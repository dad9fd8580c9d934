//! Namespace URIs, confirmation methods and other SAML constants.

/// SAML 1.x assertion namespace URI.
pub const SAML1_NS: &str = "urn:oasis:names:tc:SAML:1.0:assertion";

/// SAML 2.0 assertion namespace URI.
pub const SAML2_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// XML Digital Signature namespace URI.
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML Digital Signature 1.1 namespace URI.
pub const DSIG11_NS: &str = "http://www.w3.org/2009/xmldsig11#";

/// WS-Security 1.0 `wsse` namespace URI.
pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// Local name of the WS-Security header element.
pub const SECURITY: &str = "Security";

/// XSI namespace URI.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Prefix used when marshalling SAML 1.x elements.
pub const SAML1_PREFIX: &str = "saml";

/// Prefix used when marshalling SAML 2.0 elements.
pub const SAML2_PREFIX: &str = "saml2";

/// Prefix used when marshalling XML-DSig elements.
pub const DSIG_PREFIX: &str = "ds";

/// Namespace of `InclusiveNamespaces` in exclusive C14N transforms.
pub const EXC_C14N_NS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Prefix used when marshalling `ec:InclusiveNamespaces`.
pub const EXC_C14N_PREFIX: &str = "ec";

/// Local name of the assertion root in both schema families.
pub const ASSERTION: &str = "Assertion";

const CM_PREFIX: &str = "urn:oasis:names:tc:SAML:";
const CM_HOLDER_OF_KEY_SUFFIX: &str = ":cm:holder-of-key";
const CM_SENDER_VOUCHES_SUFFIX: &str = ":cm:sender-vouches";

/// Subject confirmation method URIs.
pub mod confirmation_methods {
    /// SAML 1.x holder-of-key.
    pub const SAML1_HOLDER_OF_KEY: &str = "urn:oasis:names:tc:SAML:1.0:cm:holder-of-key";
    /// SAML 1.x sender-vouches.
    pub const SAML1_SENDER_VOUCHES: &str = "urn:oasis:names:tc:SAML:1.0:cm:sender-vouches";
    /// SAML 1.x bearer.
    pub const SAML1_BEARER: &str = "urn:oasis:names:tc:SAML:1.0:cm:bearer";
    /// SAML 2.0 holder-of-key.
    pub const SAML2_HOLDER_OF_KEY: &str = "urn:oasis:names:tc:SAML:2.0:cm:holder-of-key";
    /// SAML 2.0 sender-vouches.
    pub const SAML2_SENDER_VOUCHES: &str = "urn:oasis:names:tc:SAML:2.0:cm:sender-vouches";
    /// SAML 2.0 bearer.
    pub const SAML2_BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";
}

/// Authentication method / context class URIs.
pub mod authn_methods {
    /// SAML 1.x password authentication.
    pub const SAML1_PASSWORD: &str = "urn:oasis:names:tc:SAML:1.0:am:password";
    /// SAML 1.x X.509 public key authentication.
    pub const SAML1_X509: &str = "urn:ietf:rfc:2246";
    /// SAML 1.x unspecified method.
    pub const SAML1_UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:1.0:am:unspecified";
    /// SAML 2.0 password context class.
    pub const SAML2_PASSWORD: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:Password";
    /// SAML 2.0 X.509 context class.
    pub const SAML2_X509: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:X509";
    /// SAML 2.0 unspecified context class.
    pub const SAML2_UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:unspecified";
}

/// Canonicalization algorithm URIs.
pub mod canonicalization_algorithms {
    /// Inclusive C14N 1.0 without comments.
    pub const INCLUSIVE_C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
    /// Inclusive C14N 1.0 with comments.
    pub const INCLUSIVE_C14N_WITH_COMMENTS: &str =
        "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
    /// Exclusive C14N without comments.
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
    /// Exclusive C14N with comments.
    pub const EXCLUSIVE_C14N_WITH_COMMENTS: &str =
        "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";
}

/// Transform URIs.
pub mod transforms {
    /// Enveloped signature transform.
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

/// Returns true for a SAML holder-of-key confirmation method of any version.
pub fn is_method_holder_of_key(method: &str) -> bool {
    method.starts_with(CM_PREFIX) && method.ends_with(CM_HOLDER_OF_KEY_SUFFIX)
}

/// Returns true for a SAML sender-vouches confirmation method of any version.
pub fn is_method_sender_vouches(method: &str) -> bool {
    method.starts_with(CM_PREFIX) && method.ends_with(CM_SENDER_VOUCHES_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::confirmation_methods::*;
    use super::*;

    #[test]
    fn holder_of_key_predicate() {
        assert!(is_method_holder_of_key(SAML2_HOLDER_OF_KEY));
        assert!(is_method_holder_of_key(SAML1_HOLDER_OF_KEY));
        assert!(!is_method_holder_of_key(SAML2_SENDER_VOUCHES));
        assert!(!is_method_holder_of_key("urn:example:cm:holder-of-key"));
        assert!(!is_method_holder_of_key(""));
    }

    #[test]
    fn sender_vouches_predicate() {
        assert!(is_method_sender_vouches(SAML1_SENDER_VOUCHES));
        assert!(is_method_sender_vouches(SAML2_SENDER_VOUCHES));
        assert!(!is_method_sender_vouches(SAML2_BEARER));
        assert!(!is_method_sender_vouches("http://example.com/cm:sender-vouches"));
        assert!(!is_method_sender_vouches("urn:oasis:names:tc:SAML:2.0:cm:sender-vouches-x"));
    }
}
