//! HMAC-SHA2 algorithms (HS256, HS384, HS512)

use super::{
    utils::{constant_time_eq, octet_secret, require_key},
    Algorithm, AlgorithmFamily, Signer, Verifier,
};
use crate::{
    error::{JoseError, JoseResult},
    keys::{Key, KeyOperation},
};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;
type HmacSha512 = Hmac<Sha512>;

/// Shortest secret accepted, in bits. Anything below the hash size is
/// accepted with a warning.
const MIN_SECRET_BITS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Digest {
    Sha256,
    Sha384,
    Sha512,
}

/// HMAC with a SHA-2 hash
#[derive(Debug, Clone)]
pub struct HmacSha {
    algorithm: Algorithm,
    digest: Digest,
}

impl HmacSha {
    fn new(id: &str, digest: Digest, output: usize) -> Self {
        Self {
            algorithm: Algorithm::new(id, AlgorithmFamily::Mac)
                .with_min_key_bits(MIN_SECRET_BITS)
                .with_output_size(output),
            digest,
        }
    }

    /// HMAC-SHA256
    #[must_use]
    pub fn hs256() -> Self {
        Self::new("HS256", Digest::Sha256, 32)
    }

    /// HMAC-SHA384
    #[must_use]
    pub fn hs384() -> Self {
        Self::new("HS384", Digest::Sha384, 48)
    }

    /// HMAC-SHA512
    #[must_use]
    pub fn hs512() -> Self {
        Self::new("HS512", Digest::Sha512, 64)
    }

    fn mac(&self, message: &[u8], secret: &[u8]) -> JoseResult<Vec<u8>> {
        let invalid = |_| JoseError::invalid_key("Invalid HMAC key");
        Ok(match self.digest {
            Digest::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(secret).map_err(invalid)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            Digest::Sha384 => {
                let mut mac = HmacSha384::new_from_slice(secret).map_err(invalid)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            Digest::Sha512 => {
                let mut mac = HmacSha512::new_from_slice(secret).map_err(invalid)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
        })
    }
}

impl Signer for HmacSha {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn sign(&self, message: &[u8], key: Option<&Key>) -> JoseResult<Vec<u8>> {
        let key = require_key(self.algorithm.id(), key)?;
        self.algorithm.check_key(key, KeyOperation::Sign)?;
        let secret = octet_secret(self.algorithm.id(), key)?;

        let recommended = self.algorithm.output_size().unwrap_or_default() * 8;
        if secret.len() * 8 < recommended {
            tracing::warn!(
                alg = self.algorithm.id(),
                key_bits = secret.len() * 8,
                recommended_bits = recommended,
                "HMAC key is shorter than the hash output"
            );
        }
        self.mac(message, secret)
    }
}

impl Verifier for HmacSha {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn verify(&self, message: &[u8], signature: &[u8], key: Option<&Key>) -> JoseResult<bool> {
        let key = require_key(self.algorithm.id(), key)?;
        self.algorithm.check_key(key, KeyOperation::Verify)?;
        let expected = self.mac(message, octet_secret(self.algorithm.id(), key)?)?;
        Ok(constant_time_eq(signature, &expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn rfc4231_case_2() {
        // key = "Jefe", data = "what do ya want for nothing?"
        let key = Key::symmetric(b"Jefe".to_vec()).build().unwrap();
        let mac = HmacSha::hs256()
            .sign(b"what do ya want for nothing?", Some(&key))
            .unwrap();
        assert_eq!(
            mac,
            hex!("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
        );
    }

    #[test]
    fn verify_rejects_other_secret_and_truncation() {
        let alg = HmacSha::hs384();
        let key = Key::symmetric(b"secret".to_vec()).build().unwrap();
        let other = Key::symmetric(b"secreT".to_vec()).build().unwrap();
        let sig = alg.sign(b"payload", Some(&key)).unwrap();
        assert_eq!(sig.len(), 48);
        assert!(alg.verify(b"payload", &sig, Some(&key)).unwrap());
        assert!(!alg.verify(b"payload", &sig, Some(&other)).unwrap());
        assert!(!alg.verify(b"payload", &sig[..47], Some(&key)).unwrap());
    }

    #[test]
    fn missing_key_is_a_mismatch() {
        assert!(matches!(
            HmacSha::hs512().sign(b"m", None),
            Err(JoseError::KeyMismatch(_))
        ));
    }
}
