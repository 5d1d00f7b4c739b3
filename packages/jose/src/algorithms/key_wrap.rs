//! JWE key management: `dir`, AES key wrap (RFC 3394) and RSA-OAEP-256

use super::{
    utils::{octet_secret, random_bytes, rsa_private, rsa_public},
    Algorithm, AlgorithmFamily, KeyWrapper, WrappedKey,
};
use crate::{
    error::{JoseError, JoseResult},
    keys::{Key, KeyOperation},
};
use aes::cipher::generic_array::GenericArray;
use aes_kw::{KekAes128, KekAes256};
use rsa::{rand_core::OsRng, Oaep};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Shared symmetric key used directly as the CEK
#[derive(Debug, Clone)]
pub struct Direct {
    algorithm: Algorithm,
}

impl Direct {
    /// The `dir` algorithm
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: Algorithm::new("dir", AlgorithmFamily::Direct),
        }
    }

    fn direct_key(&self, cek_len: usize, key: &Key, op: KeyOperation) -> JoseResult<Zeroizing<Vec<u8>>> {
        self.algorithm.check_key(key, op)?;
        let secret = octet_secret(self.algorithm.id(), key)?;
        if secret.len() != cek_len {
            return Err(JoseError::key_mismatch(format!(
                "dir needs a {}-bit key for this content encryption, got {}",
                cek_len * 8,
                secret.len() * 8
            )));
        }
        Ok(Zeroizing::new(secret.to_vec()))
    }
}

impl Default for Direct {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyWrapper for Direct {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn check_key(&self, cek_len: usize, key: &Key) -> JoseResult<()> {
        self.direct_key(cek_len, key, KeyOperation::Encrypt).map(drop)
    }

    fn wrap(&self, cek_len: usize, key: &Key) -> JoseResult<WrappedKey> {
        Ok(WrappedKey {
            cek: self.direct_key(cek_len, key, KeyOperation::Encrypt)?,
            encrypted_key: Vec::new(),
        })
    }

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        cek_len: usize,
        key: &Key,
    ) -> JoseResult<Zeroizing<Vec<u8>>> {
        if !encrypted_key.is_empty() {
            return Err(JoseError::structural("dir requires an empty encrypted key"));
        }
        self.direct_key(cek_len, key, KeyOperation::Decrypt)
    }
}

/// AES key wrap with a 128- or 256-bit key-encryption key
#[derive(Debug, Clone)]
pub struct AesKeyWrap {
    algorithm: Algorithm,
    kek_len: usize,
}

impl AesKeyWrap {
    /// AES-128 key wrap
    #[must_use]
    pub fn a128kw() -> Self {
        Self {
            algorithm: Algorithm::new("A128KW", AlgorithmFamily::AesKeyWrap).with_min_key_bits(128),
            kek_len: 16,
        }
    }

    /// AES-256 key wrap
    #[must_use]
    pub fn a256kw() -> Self {
        Self {
            algorithm: Algorithm::new("A256KW", AlgorithmFamily::AesKeyWrap).with_min_key_bits(256),
            kek_len: 32,
        }
    }

    fn kek<'k>(&self, key: &'k Key, op: KeyOperation) -> JoseResult<&'k [u8]> {
        self.algorithm.check_key(key, op)?;
        let kek = octet_secret(self.algorithm.id(), key)?;
        if kek.len() != self.kek_len {
            return Err(JoseError::key_mismatch(format!(
                "{} requires a {}-bit key, got {}",
                self.algorithm.id(),
                self.kek_len * 8,
                kek.len() * 8
            )));
        }
        Ok(kek)
    }
}

impl KeyWrapper for AesKeyWrap {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn check_key(&self, _cek_len: usize, key: &Key) -> JoseResult<()> {
        self.kek(key, KeyOperation::WrapKey).map(drop)
    }

    fn wrap(&self, cek_len: usize, key: &Key) -> JoseResult<WrappedKey> {
        let kek = self.kek(key, KeyOperation::WrapKey)?;
        let cek = random_bytes(cek_len);
        let wrapped = match self.kek_len {
            16 => KekAes128::new(GenericArray::from_slice(kek)).wrap_vec(&cek),
            _ => KekAes256::new(GenericArray::from_slice(kek)).wrap_vec(&cek),
        }
        .map_err(|e| JoseError::Crypto(format!("{} wrap failed: {e}", self.algorithm.id())))?;
        Ok(WrappedKey {
            cek,
            encrypted_key: wrapped,
        })
    }

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        cek_len: usize,
        key: &Key,
    ) -> JoseResult<Zeroizing<Vec<u8>>> {
        let kek = self.kek(key, KeyOperation::UnwrapKey)?;
        let cek = match self.kek_len {
            16 => KekAes128::new(GenericArray::from_slice(kek)).unwrap_vec(encrypted_key),
            _ => KekAes256::new(GenericArray::from_slice(kek)).unwrap_vec(encrypted_key),
        }
        .map(Zeroizing::new)
        .map_err(|_| JoseError::Signature)?;
        if cek.len() != cek_len {
            return Err(JoseError::Signature);
        }
        Ok(cek)
    }
}

/// RSAES-OAEP with SHA-256 and MGF1-SHA-256
#[derive(Debug, Clone)]
pub struct RsaOaep256 {
    algorithm: Algorithm,
}

impl RsaOaep256 {
    /// The `RSA-OAEP-256` algorithm
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: Algorithm::new("RSA-OAEP-256", AlgorithmFamily::RsaEncrypt)
                .with_min_key_bits(2048),
        }
    }
}

impl Default for RsaOaep256 {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyWrapper for RsaOaep256 {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn check_key(&self, _cek_len: usize, key: &Key) -> JoseResult<()> {
        self.algorithm.check_key(key, KeyOperation::WrapKey)?;
        rsa_public(self.algorithm.id(), key).map(drop)
    }

    fn wrap(&self, cek_len: usize, key: &Key) -> JoseResult<WrappedKey> {
        self.algorithm.check_key(key, KeyOperation::WrapKey)?;
        let public = rsa_public(self.algorithm.id(), key)?;
        let cek = random_bytes(cek_len);
        let encrypted_key = public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &cek)
            .map_err(|e| JoseError::Crypto(format!("RSA-OAEP-256 wrap failed: {e}")))?;
        Ok(WrappedKey { cek, encrypted_key })
    }

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        cek_len: usize,
        key: &Key,
    ) -> JoseResult<Zeroizing<Vec<u8>>> {
        self.algorithm.check_key(key, KeyOperation::UnwrapKey)?;
        let private = rsa_private(self.algorithm.id(), key)?;
        // A failed unwrap yields a random CEK so the content tag check fails
        // the same way a tampered ciphertext does (RFC 7516 §11.5).
        match private.decrypt(Oaep::new::<Sha256>(), encrypted_key) {
            Ok(cek) if cek.len() == cek_len => Ok(Zeroizing::new(cek)),
            _ => Ok(random_bytes(cek_len)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oct(len: usize) -> Key {
        Key::symmetric(vec![0x42; len]).build().unwrap()
    }

    #[test]
    fn aes_kw_round_trip_and_tamper() {
        let wrapper = AesKeyWrap::a128kw();
        let key = oct(16);
        let wrapped = wrapper.wrap(32, &key).unwrap();
        assert_eq!(wrapped.encrypted_key.len(), 40);
        let cek = wrapper.unwrap(&wrapped.encrypted_key, 32, &key).unwrap();
        assert_eq!(cek.as_slice(), wrapped.cek.as_slice());

        let mut tampered = wrapped.encrypted_key.clone();
        tampered[0] ^= 1;
        assert_eq!(
            wrapper.unwrap(&tampered, 32, &key).err(),
            Some(JoseError::Signature)
        );
    }

    #[test]
    fn aes_kw_requires_exact_kek_size() {
        assert!(matches!(
            AesKeyWrap::a256kw().wrap(16, &oct(16)),
            Err(JoseError::KeyMismatch(_))
        ));
        assert!(matches!(
            AesKeyWrap::a128kw().wrap(16, &oct(32)),
            Err(JoseError::KeyMismatch(_))
        ));
    }

    #[test]
    fn key_checks_run_without_wrapping() {
        assert!(Direct::new().check_key(32, &oct(32)).is_ok());
        assert!(matches!(
            Direct::new().check_key(32, &oct(16)),
            Err(JoseError::KeyMismatch(_))
        ));
        assert!(AesKeyWrap::a128kw().check_key(32, &oct(16)).is_ok());
        assert!(matches!(
            AesKeyWrap::a128kw().check_key(32, &oct(32)),
            Err(JoseError::KeyMismatch(_))
        ));
        assert!(matches!(
            RsaOaep256::new().check_key(32, &oct(32)),
            Err(JoseError::KeyMismatch(_))
        ));
    }

    #[test]
    fn dir_uses_key_as_cek() {
        let key = oct(16);
        let wrapped = Direct::new().wrap(16, &key).unwrap();
        assert!(wrapped.encrypted_key.is_empty());
        assert_eq!(wrapped.cek.as_slice(), &[0x42; 16]);
        assert!(Direct::new().wrap(32, &key).is_err());
        assert!(matches!(
            Direct::new().unwrap(b"x", 16, &key),
            Err(JoseError::Structural(_))
        ));
    }
}
