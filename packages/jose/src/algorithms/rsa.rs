//! RSA signature algorithms: RSASSA-PKCS1-v1_5 (RS*) and RSASSA-PSS (PS*)

use super::{
    utils::{require_key, rsa_private, rsa_public},
    Algorithm, AlgorithmFamily, Signer, Verifier,
};
use crate::{
    error::{JoseError, JoseResult},
    keys::{Key, KeyOperation},
};
use rsa::{
    pkcs1v15, pss,
    rand_core::OsRng,
    signature::{RandomizedSigner, SignatureEncoding, Signer as _, Verifier as _},
    RsaPrivateKey, RsaPublicKey,
};
use sha2::{Sha256, Sha384, Sha512};

/// Smallest modulus accepted for signing or verification
const MIN_MODULUS_BITS: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Padding {
    Pkcs1v15,
    Pss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Digest {
    Sha256,
    Sha384,
    Sha512,
}

/// RSA signature with a SHA-2 hash
#[derive(Debug, Clone)]
pub struct RsaSignature {
    algorithm: Algorithm,
    padding: Padding,
    digest: Digest,
}

impl RsaSignature {
    fn new(id: &str, padding: Padding, digest: Digest) -> Self {
        Self {
            algorithm: Algorithm::new(id, AlgorithmFamily::RsaSign)
                .with_min_key_bits(MIN_MODULUS_BITS),
            padding,
            digest,
        }
    }

    /// RSASSA-PKCS1-v1_5 with SHA-256
    #[must_use]
    pub fn rs256() -> Self {
        Self::new("RS256", Padding::Pkcs1v15, Digest::Sha256)
    }

    /// RSASSA-PKCS1-v1_5 with SHA-384
    #[must_use]
    pub fn rs384() -> Self {
        Self::new("RS384", Padding::Pkcs1v15, Digest::Sha384)
    }

    /// RSASSA-PKCS1-v1_5 with SHA-512
    #[must_use]
    pub fn rs512() -> Self {
        Self::new("RS512", Padding::Pkcs1v15, Digest::Sha512)
    }

    /// RSASSA-PSS with SHA-256 and MGF1-SHA-256
    #[must_use]
    pub fn ps256() -> Self {
        Self::new("PS256", Padding::Pss, Digest::Sha256)
    }

    /// RSASSA-PSS with SHA-384 and MGF1-SHA-384
    #[must_use]
    pub fn ps384() -> Self {
        Self::new("PS384", Padding::Pss, Digest::Sha384)
    }

    /// RSASSA-PSS with SHA-512 and MGF1-SHA-512
    #[must_use]
    pub fn ps512() -> Self {
        Self::new("PS512", Padding::Pss, Digest::Sha512)
    }

    fn sign_with(&self, message: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>, rsa::signature::Error> {
        let key = key.clone();
        let signature = match (self.padding, self.digest) {
            (Padding::Pkcs1v15, Digest::Sha256) => {
                pkcs1v15::SigningKey::<Sha256>::new(key).try_sign(message)?.to_vec()
            }
            (Padding::Pkcs1v15, Digest::Sha384) => {
                pkcs1v15::SigningKey::<Sha384>::new(key).try_sign(message)?.to_vec()
            }
            (Padding::Pkcs1v15, Digest::Sha512) => {
                pkcs1v15::SigningKey::<Sha512>::new(key).try_sign(message)?.to_vec()
            }
            (Padding::Pss, Digest::Sha256) => pss::BlindedSigningKey::<Sha256>::new(key)
                .try_sign_with_rng(&mut OsRng, message)?
                .to_vec(),
            (Padding::Pss, Digest::Sha384) => pss::BlindedSigningKey::<Sha384>::new(key)
                .try_sign_with_rng(&mut OsRng, message)?
                .to_vec(),
            (Padding::Pss, Digest::Sha512) => pss::BlindedSigningKey::<Sha512>::new(key)
                .try_sign_with_rng(&mut OsRng, message)?
                .to_vec(),
        };
        Ok(signature)
    }

    fn verify_with(&self, message: &[u8], signature: &[u8], key: RsaPublicKey) -> bool {
        match self.padding {
            Padding::Pkcs1v15 => {
                let Ok(signature) = pkcs1v15::Signature::try_from(signature) else {
                    return false;
                };
                match self.digest {
                    Digest::Sha256 => pkcs1v15::VerifyingKey::<Sha256>::new(key)
                        .verify(message, &signature)
                        .is_ok(),
                    Digest::Sha384 => pkcs1v15::VerifyingKey::<Sha384>::new(key)
                        .verify(message, &signature)
                        .is_ok(),
                    Digest::Sha512 => pkcs1v15::VerifyingKey::<Sha512>::new(key)
                        .verify(message, &signature)
                        .is_ok(),
                }
            }
            Padding::Pss => {
                let Ok(signature) = pss::Signature::try_from(signature) else {
                    return false;
                };
                match self.digest {
                    Digest::Sha256 => pss::VerifyingKey::<Sha256>::new(key)
                        .verify(message, &signature)
                        .is_ok(),
                    Digest::Sha384 => pss::VerifyingKey::<Sha384>::new(key)
                        .verify(message, &signature)
                        .is_ok(),
                    Digest::Sha512 => pss::VerifyingKey::<Sha512>::new(key)
                        .verify(message, &signature)
                        .is_ok(),
                }
            }
        }
    }
}

impl Signer for RsaSignature {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn sign(&self, message: &[u8], key: Option<&Key>) -> JoseResult<Vec<u8>> {
        let key = require_key(self.algorithm.id(), key)?;
        self.algorithm.check_key(key, KeyOperation::Sign)?;
        let private = rsa_private(self.algorithm.id(), key)?;
        self.sign_with(message, private)
            .map_err(|e| JoseError::Crypto(format!("{} signing failed: {e}", self.algorithm.id())))
    }
}

impl Verifier for RsaSignature {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn verify(&self, message: &[u8], signature: &[u8], key: Option<&Key>) -> JoseResult<bool> {
        let key = require_key(self.algorithm.id(), key)?;
        self.algorithm.check_key(key, KeyOperation::Verify)?;
        let public = rsa_public(self.algorithm.id(), key)?;
        Ok(self.verify_with(message, signature, public))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyMaterial;
    use once_cell::sync::Lazy;

    static KEY: Lazy<Key> = Lazy::new(|| {
        let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        Key::builder(KeyMaterial::RsaPrivate(Box::new(private)))
            .build()
            .unwrap()
    });

    #[test]
    fn pkcs1_and_pss_sign_and_verify() {
        for alg in [RsaSignature::rs256(), RsaSignature::ps384()] {
            let sig = alg.sign(b"message", Some(&*KEY)).unwrap();
            assert_eq!(sig.len(), 256);
            let public = KEY.to_public().unwrap();
            assert!(alg.verify(b"message", &sig, Some(&public)).unwrap());
            assert!(!alg.verify(b"massage", &sig, Some(&public)).unwrap());
        }
    }

    #[test]
    fn public_key_cannot_sign() {
        let public = KEY.to_public().unwrap();
        assert!(matches!(
            RsaSignature::rs256().sign(b"m", Some(&public)),
            Err(JoseError::KeyMismatch(_))
        ));
    }

    #[test]
    fn short_modulus_rejected() {
        let small = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let key = Key::builder(KeyMaterial::RsaPrivate(Box::new(small)))
            .build()
            .unwrap();
        assert!(matches!(
            RsaSignature::ps256().sign(b"m", Some(&key)),
            Err(JoseError::KeyMismatch(_))
        ));
    }
}
