//! ECDSA algorithms (ES256 on P-256, ES384 on P-384)
//!
//! Signatures use the fixed-width `r || s` encoding of RFC 7518 §3.4, not DER.

use super::{utils::require_key, Algorithm, AlgorithmFamily, Signer, Verifier};
use crate::{
    error::{JoseError, JoseResult},
    keys::{EcCurve, EcPrivateKey, EcPublicKey, Key, KeyMaterial, KeyOperation},
};
use p256::ecdsa::signature::{Signer as _, Verifier as _};

/// ECDSA on a NIST curve with the matching SHA-2 hash
#[derive(Debug, Clone)]
pub struct Ecdsa {
    algorithm: Algorithm,
}

impl Ecdsa {
    /// ECDSA P-256 with SHA-256
    #[must_use]
    pub fn es256() -> Self {
        Self {
            algorithm: Algorithm::new("ES256", AlgorithmFamily::Ecdsa)
                .with_min_key_bits(256)
                .with_output_size(64)
                .with_curve(EcCurve::P256),
        }
    }

    /// ECDSA P-384 with SHA-384
    #[must_use]
    pub fn es384() -> Self {
        Self {
            algorithm: Algorithm::new("ES384", AlgorithmFamily::Ecdsa)
                .with_min_key_bits(384)
                .with_output_size(96)
                .with_curve(EcCurve::P384),
        }
    }
}

impl Signer for Ecdsa {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn sign(&self, message: &[u8], key: Option<&Key>) -> JoseResult<Vec<u8>> {
        let key = require_key(self.algorithm.id(), key)?;
        self.algorithm.check_key(key, KeyOperation::Sign)?;
        let failed = |e: p256::ecdsa::Error| {
            JoseError::Crypto(format!("{} signing failed: {e}", self.algorithm.id()))
        };
        match key.material() {
            KeyMaterial::EcPrivate(EcPrivateKey::P256(k)) => {
                let signature: p256::ecdsa::Signature = k.try_sign(message).map_err(failed)?;
                Ok(signature.to_bytes().to_vec())
            }
            KeyMaterial::EcPrivate(EcPrivateKey::P384(k)) => {
                let signature: p384::ecdsa::Signature = k.try_sign(message).map_err(failed)?;
                Ok(signature.to_bytes().to_vec())
            }
            _ => Err(JoseError::key_mismatch(format!(
                "{} needs an EC private key",
                self.algorithm.id()
            ))),
        }
    }
}

impl Verifier for Ecdsa {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn verify(&self, message: &[u8], signature: &[u8], key: Option<&Key>) -> JoseResult<bool> {
        let key = require_key(self.algorithm.id(), key)?;
        self.algorithm.check_key(key, KeyOperation::Verify)?;
        let public = match key.material() {
            KeyMaterial::EcPublic(k) => k.clone(),
            KeyMaterial::EcPrivate(k) => k.public_key(),
            _ => {
                return Err(JoseError::key_mismatch(format!(
                    "{} requires an EC key",
                    self.algorithm.id()
                )))
            }
        };
        Ok(match public {
            EcPublicKey::P256(k) => p256::ecdsa::Signature::from_slice(signature)
                .map(|sig| k.verify(message, &sig).is_ok())
                .unwrap_or(false),
            EcPublicKey::P384(k) => p384::ecdsa::Signature::from_slice(signature)
                .map(|sig| k.verify(message, &sig).is_ok())
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p256_key() -> Key {
        let signing = p256::ecdsa::SigningKey::from_slice(&[3u8; 32]).unwrap();
        Key::builder(KeyMaterial::EcPrivate(EcPrivateKey::P256(signing)))
            .build()
            .unwrap()
    }

    #[test]
    fn es256_fixed_width_signature() {
        let key = p256_key();
        let sig = Ecdsa::es256().sign(b"payload", Some(&key)).unwrap();
        assert_eq!(sig.len(), 64);
        let public = key.to_public().unwrap();
        assert!(Ecdsa::es256().verify(b"payload", &sig, Some(&public)).unwrap());
        assert!(!Ecdsa::es256().verify(b"payload", &sig[..63], Some(&public)).unwrap());
    }

    #[test]
    fn curve_mismatch_is_rejected() {
        let key = p256_key();
        assert!(matches!(
            Ecdsa::es384().sign(b"payload", Some(&key)),
            Err(JoseError::KeyMismatch(_))
        ));
    }
}
