//! Shared helpers for the algorithm implementations

use crate::{
    error::{JoseError, JoseResult},
    keys::{Key, KeyMaterial},
};
use rand::RngCore;
use rsa::{RsaPrivateKey, RsaPublicKey};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Constant-time byte comparison; unequal lengths compare unequal
#[inline]
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Fresh random bytes from the thread-local CSPRNG
pub(crate) fn random_bytes(len: usize) -> Zeroizing<Vec<u8>> {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Key argument for algorithms that cannot run without one
pub(crate) fn require_key<'k>(alg: &str, key: Option<&'k Key>) -> JoseResult<&'k Key> {
    key.ok_or_else(|| JoseError::key_mismatch(format!("{alg} requires a key")))
}

/// Symmetric secret of an `oct` key
pub(crate) fn octet_secret<'k>(alg: &str, key: &'k Key) -> JoseResult<&'k [u8]> {
    match key.material() {
        KeyMaterial::Octet(secret) => Ok(secret.as_slice()),
        _ => Err(JoseError::key_mismatch(format!("{alg} requires an oct key"))),
    }
}

/// RSA private key, for signing and unwrapping
pub(crate) fn rsa_private<'k>(alg: &str, key: &'k Key) -> JoseResult<&'k RsaPrivateKey> {
    match key.material() {
        KeyMaterial::RsaPrivate(k) => Ok(k.as_ref()),
        KeyMaterial::RsaPublic(_) => Err(JoseError::key_mismatch(format!(
            "{alg} needs an RSA private key"
        ))),
        _ => Err(JoseError::key_mismatch(format!("{alg} requires an RSA key"))),
    }
}

/// RSA public key, derived from a private key when needed
pub(crate) fn rsa_public(alg: &str, key: &Key) -> JoseResult<RsaPublicKey> {
    match key.material() {
        KeyMaterial::RsaPublic(k) => Ok(k.clone()),
        KeyMaterial::RsaPrivate(k) => Ok(k.to_public_key()),
        _ => Err(JoseError::key_mismatch(format!("{alg} requires an RSA key"))),
    }
}
