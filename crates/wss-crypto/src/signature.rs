//! Signature verification and creation.
//!
//! The verification key is taken from a [`PublicKey`]; the algorithm comes
//! from the `ds:SignatureMethod` URI and must match the key family.

use std::fmt;

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{
    self as lc, EcdsaKeyPair, EcdsaSigningAlgorithm, RsaKeyPair, UnparsedPublicKey,
    VerificationAlgorithm,
};

use crate::algorithm::SignatureAlgorithm;
use crate::certificate::{KeyAlgorithm, PublicKey};
use crate::error::{CryptoError, CryptoResult};

fn verification_algorithm(
    algorithm: SignatureAlgorithm,
    key: &KeyAlgorithm,
) -> CryptoResult<&'static dyn VerificationAlgorithm> {
    let alg: &'static dyn VerificationAlgorithm = match (algorithm, key) {
        (SignatureAlgorithm::RsaSha1, KeyAlgorithm::Rsa) => {
            &lc::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY
        }
        (SignatureAlgorithm::RsaSha256, KeyAlgorithm::Rsa) => &lc::RSA_PKCS1_2048_8192_SHA256,
        (SignatureAlgorithm::RsaSha384, KeyAlgorithm::Rsa) => &lc::RSA_PKCS1_2048_8192_SHA384,
        (SignatureAlgorithm::RsaSha512, KeyAlgorithm::Rsa) => &lc::RSA_PKCS1_2048_8192_SHA512,
        (SignatureAlgorithm::EcdsaSha256, KeyAlgorithm::EcP256) => &lc::ECDSA_P256_SHA256_ASN1,
        (SignatureAlgorithm::EcdsaSha384, KeyAlgorithm::EcP384) => &lc::ECDSA_P384_SHA384_ASN1,
        (SignatureAlgorithm::EcdsaSha512, KeyAlgorithm::EcP521) => &lc::ECDSA_P521_SHA512_ASN1,
        (alg, key) => {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{} with {key:?} key",
                alg.uri()
            )));
        }
    };
    Ok(alg)
}

/// Verifies `signature` over `data` with `public_key`.
pub fn verify_signature(
    public_key: &PublicKey,
    algorithm: SignatureAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> CryptoResult<()> {
    let alg = verification_algorithm(algorithm, public_key.algorithm())?;
    UnparsedPublicKey::new(alg, public_key.key_bytes())
        .verify(data, signature)
        .map_err(|_| CryptoError::Verification)
}

enum KeyPair {
    Ecdsa(EcdsaKeyPair),
    Rsa(RsaKeyPair),
}

/// A private key able to produce XML-DSig signature values.
pub struct SigningKey {
    key_pair: KeyPair,
    algorithm: SignatureAlgorithm,
    rng: SystemRandom,
}

impl SigningKey {
    /// Creates a signing key from a PKCS#8 DER private key.
    pub fn from_pkcs8(pkcs8_der: &[u8], algorithm: SignatureAlgorithm) -> CryptoResult<Self> {
        let key_pair = if algorithm.is_rsa() {
            if algorithm.is_deprecated() {
                return Err(CryptoError::UnsupportedAlgorithm(
                    "SHA-1 signing is not supported".to_string(),
                ));
            }
            KeyPair::Rsa(
                RsaKeyPair::from_pkcs8(pkcs8_der)
                    .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA PKCS#8 key: {e}")))?,
            )
        } else {
            let signing: &'static EcdsaSigningAlgorithm = match algorithm {
                SignatureAlgorithm::EcdsaSha256 => &lc::ECDSA_P256_SHA256_ASN1_SIGNING,
                SignatureAlgorithm::EcdsaSha384 => &lc::ECDSA_P384_SHA384_ASN1_SIGNING,
                _ => &lc::ECDSA_P521_SHA512_ASN1_SIGNING,
            };
            KeyPair::Ecdsa(
                EcdsaKeyPair::from_pkcs8(signing, pkcs8_der)
                    .map_err(|e| CryptoError::InvalidKey(format!("invalid EC PKCS#8 key: {e}")))?,
            )
        };

        Ok(Self {
            key_pair,
            algorithm,
            rng: SystemRandom::new(),
        })
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signs `data`.
    pub fn sign(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        match &self.key_pair {
            KeyPair::Ecdsa(key_pair) => key_pair
                .sign(&self.rng, data)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|e| CryptoError::Signing(format!("ECDSA signing failed: {e}"))),
            KeyPair::Rsa(key_pair) => {
                let padding: &'static dyn lc::RsaEncoding = match self.algorithm {
                    SignatureAlgorithm::RsaSha384 => &lc::RSA_PKCS1_SHA384,
                    SignatureAlgorithm::RsaSha512 => &lc::RSA_PKCS1_SHA512,
                    _ => &lc::RSA_PKCS1_SHA256,
                };
                let mut signature = vec![0u8; key_pair.public_modulus_len()];
                key_pair
                    .sign(padding, &self.rng, data, &mut signature)
                    .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;
                Ok(signature)
            }
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
