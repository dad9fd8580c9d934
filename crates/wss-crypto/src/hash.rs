//! Digest functions.

use aws_lc_rs::digest as lc_digest;

use crate::algorithm::DigestAlgorithm;

/// Computes the digest of `data` with the given algorithm.
#[must_use]
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    let alg = match algorithm {
        DigestAlgorithm::Sha1 => &lc_digest::SHA1_FOR_LEGACY_USE_ONLY,
        DigestAlgorithm::Sha256 => &lc_digest::SHA256,
        DigestAlgorithm::Sha384 => &lc_digest::SHA384,
        DigestAlgorithm::Sha512 => &lc_digest::SHA512,
    };

    lc_digest::digest(alg, data).as_ref().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_lengths() {
        assert_eq!(digest(DigestAlgorithm::Sha1, b"test").len(), 20);
        assert_eq!(digest(DigestAlgorithm::Sha256, b"test").len(), 32);
        assert_eq!(digest(DigestAlgorithm::Sha384, b"test").len(), 48);
        assert_eq!(digest(DigestAlgorithm::Sha512, b"test").len(), 64);
    }

    #[test]
    fn digest_is_deterministic() {
        let a = digest(DigestAlgorithm::Sha256, b"hello world");
        let b = digest(DigestAlgorithm::Sha256, b"hello world");
        assert_eq!(a, b);
        assert_ne!(a, digest(DigestAlgorithm::Sha256, b"hello world!"));
    }
}
