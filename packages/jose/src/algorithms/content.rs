//! AES-GCM content encryption (A128GCM, A256GCM)

use super::{Algorithm, AlgorithmFamily, ContentCipher, Sealed};
use crate::error::{JoseError, JoseResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, AeadInPlace, KeyInit},
    Aes128Gcm, Aes256Gcm,
};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// AES in Galois/Counter Mode with a 96-bit IV and 128-bit tag
#[derive(Debug, Clone)]
pub struct AesGcm {
    algorithm: Algorithm,
    key_len: usize,
}

impl AesGcm {
    /// AES-128-GCM
    #[must_use]
    pub fn a128gcm() -> Self {
        Self {
            algorithm: Algorithm::new("A128GCM", AlgorithmFamily::Aead)
                .with_min_key_bits(128)
                .with_output_size(TAG_LEN),
            key_len: 16,
        }
    }

    /// AES-256-GCM
    #[must_use]
    pub fn a256gcm() -> Self {
        Self {
            algorithm: Algorithm::new("A256GCM", AlgorithmFamily::Aead)
                .with_min_key_bits(256)
                .with_output_size(TAG_LEN),
            key_len: 32,
        }
    }

    fn check_cek(&self, cek: &[u8]) -> JoseResult<()> {
        if cek.len() == self.key_len {
            Ok(())
        } else {
            Err(JoseError::key_mismatch(format!(
                "{} requires a {}-byte CEK, got {}",
                self.algorithm.id(),
                self.key_len,
                cek.len()
            )))
        }
    }
}

impl ContentCipher for AesGcm {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn key_len(&self) -> usize {
        self.key_len
    }

    fn iv_len(&self) -> usize {
        IV_LEN
    }

    fn encrypt(&self, cek: &[u8], iv: &[u8], aad: &[u8], plaintext: &[u8]) -> JoseResult<Sealed> {
        self.check_cek(cek)?;
        if iv.len() != IV_LEN {
            return Err(JoseError::Crypto(format!("IV must be {IV_LEN} bytes")));
        }
        let nonce = GenericArray::from_slice(iv);
        let mut buffer = plaintext.to_vec();
        let tag = match self.key_len {
            16 => Aes128Gcm::new(GenericArray::from_slice(cek))
                .encrypt_in_place_detached(nonce, aad, &mut buffer),
            _ => Aes256Gcm::new(GenericArray::from_slice(cek))
                .encrypt_in_place_detached(nonce, aad, &mut buffer),
        }
        .map_err(|e| JoseError::Crypto(format!("{} encryption failed: {e}", self.algorithm.id())))?;
        Ok(Sealed {
            ciphertext: buffer,
            tag: tag.to_vec(),
        })
    }

    fn decrypt(
        &self,
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> JoseResult<Vec<u8>> {
        self.check_cek(cek)?;
        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(JoseError::Signature);
        }
        let nonce = GenericArray::from_slice(iv);
        let tag = GenericArray::from_slice(tag);
        let mut buffer = ciphertext.to_vec();
        match self.key_len {
            16 => Aes128Gcm::new(GenericArray::from_slice(cek))
                .decrypt_in_place_detached(nonce, aad, &mut buffer, tag),
            _ => Aes256Gcm::new(GenericArray::from_slice(cek))
                .decrypt_in_place_detached(nonce, aad, &mut buffer, tag),
        }
        .map_err(|_| JoseError::Signature)?;
        Ok(buffer)
    }
}
