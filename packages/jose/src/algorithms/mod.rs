//! Algorithm capabilities and the registry that maps identifiers to them
//!
//! Dispatch is a table lookup: every algorithm is a value implementing one of
//! the capability traits below, registered once under its identifier.

mod content;
mod ecdsa;
mod hmac;
mod key_wrap;
mod none;
mod rsa;
mod utils;

pub use self::content::AesGcm;
pub use self::ecdsa::Ecdsa;
pub use self::hmac::HmacSha;
pub use self::key_wrap::{AesKeyWrap, Direct, RsaOaep256};
pub use self::none::Unsecured;
pub use self::rsa::RsaSignature;

pub(crate) use self::utils::random_bytes;

use crate::{
    error::{JoseError, JoseResult},
    keys::{EcCurve, Key, KeyOperation, KeyType},
};
use once_cell::sync::Lazy;
use std::{collections::BTreeMap, fmt, sync::Arc};
use zeroize::Zeroizing;

/// Identifier of the unsecured algorithm
pub const NONE: &str = "none";

/// Algorithm family, which fixes the capability and the key type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    /// `none`
    Unsecured,
    /// HMAC
    Mac,
    /// RSASSA-PKCS1-v1_5 and RSASSA-PSS
    RsaSign,
    /// ECDSA
    Ecdsa,
    /// RSAES-OAEP key encryption
    RsaEncrypt,
    /// AES key wrap
    AesKeyWrap,
    /// Direct use of a shared symmetric key as the CEK
    Direct,
    /// Authenticated content encryption
    Aead,
}

impl AlgorithmFamily {
    /// Key type the family operates on; `None` for the unsecured family
    #[must_use]
    pub fn key_type(self) -> Option<KeyType> {
        match self {
            AlgorithmFamily::Unsecured => None,
            AlgorithmFamily::Mac
            | AlgorithmFamily::AesKeyWrap
            | AlgorithmFamily::Direct
            | AlgorithmFamily::Aead => Some(KeyType::Oct),
            AlgorithmFamily::RsaSign | AlgorithmFamily::RsaEncrypt => Some(KeyType::Rsa),
            AlgorithmFamily::Ecdsa => Some(KeyType::Ec),
        }
    }
}

/// Immutable algorithm descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Algorithm {
    id: String,
    family: AlgorithmFamily,
    min_key_bits: usize,
    output_size: Option<usize>,
    curve: Option<EcCurve>,
}

impl Algorithm {
    /// New descriptor with no key-size floor
    #[must_use]
    pub fn new(id: impl Into<String>, family: AlgorithmFamily) -> Self {
        Self {
            id: id.into(),
            family,
            min_key_bits: 0,
            output_size: None,
            curve: None,
        }
    }

    /// Set the minimum key size in bits
    #[must_use]
    pub fn with_min_key_bits(mut self, bits: usize) -> Self {
        self.min_key_bits = bits;
        self
    }

    /// Set the fixed output size in bytes
    #[must_use]
    pub fn with_output_size(mut self, bytes: usize) -> Self {
        self.output_size = Some(bytes);
        self
    }

    /// Bind the algorithm to an EC curve
    #[must_use]
    pub fn with_curve(mut self, curve: EcCurve) -> Self {
        self.curve = Some(curve);
        self
    }

    /// Identifier as it appears in `alg` or `enc`
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Family
    #[must_use]
    pub fn family(&self) -> AlgorithmFamily {
        self.family
    }

    /// Required key type
    #[must_use]
    pub fn key_type(&self) -> Option<KeyType> {
        self.family.key_type()
    }

    /// Minimum key size in bits
    #[must_use]
    pub fn min_key_bits(&self) -> usize {
        self.min_key_bits
    }

    /// Signature, tag or CEK size in bytes, when fixed
    #[must_use]
    pub fn output_size(&self) -> Option<usize> {
        self.output_size
    }

    /// Required curve for ECDSA
    #[must_use]
    pub fn curve(&self) -> Option<EcCurve> {
        self.curve
    }

    /// Check that `key` may be used by this algorithm for `op`
    ///
    /// # Errors
    /// Returns `JoseError::KeyMismatch` on wrong key type or curve, a key
    /// below the minimum size, usage metadata that forbids `op`, or an
    /// `alg` hint naming another algorithm
    pub fn check_key(&self, key: &Key, op: KeyOperation) -> JoseResult<()> {
        if let Some(required) = self.key_type() {
            if key.key_type() != required {
                return Err(JoseError::key_mismatch(format!(
                    "{} requires a {required} key, got {}",
                    self.id,
                    key.key_type()
                )));
            }
        }
        if let Some(curve) = self.curve {
            if key.material().curve() != Some(curve) {
                return Err(JoseError::key_mismatch(format!(
                    "{} requires a {} key",
                    self.id,
                    curve.as_str()
                )));
            }
        }
        let bits = key.material().size_bits();
        if bits < self.min_key_bits {
            return Err(JoseError::key_mismatch(format!(
                "{} requires at least a {}-bit key, got {bits}",
                self.id, self.min_key_bits
            )));
        }
        if !key.permits(op) {
            return Err(JoseError::key_mismatch(format!(
                "key does not permit '{}'",
                op.as_str()
            )));
        }
        if let Some(hint) = key.algorithm_hint() {
            if hint != self.id {
                return Err(JoseError::key_mismatch(format!(
                    "key is restricted to {hint}, not {}",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Produces signatures or MACs
pub trait Signer: Send + Sync {
    /// Descriptor of the implemented algorithm
    fn algorithm(&self) -> &Algorithm;

    /// Sign `message`; only the unsecured algorithm accepts `None`
    ///
    /// # Errors
    /// `JoseError::KeyMismatch` when the key precondition fails
    fn sign(&self, message: &[u8], key: Option<&Key>) -> JoseResult<Vec<u8>>;
}

/// Checks signatures or MACs
pub trait Verifier: Send + Sync {
    /// Descriptor of the implemented algorithm
    fn algorithm(&self) -> &Algorithm;

    /// Whether `signature` is valid for `message` under `key`
    ///
    /// # Errors
    /// `JoseError::KeyMismatch` when the key precondition fails; a bad
    /// signature is `Ok(false)`, never an error
    fn verify(&self, message: &[u8], signature: &[u8], key: Option<&Key>) -> JoseResult<bool>;
}

/// Content-encryption key and its encrypted form
pub struct WrappedKey {
    /// The CEK handed to the content cipher
    pub cek: Zeroizing<Vec<u8>>,
    /// The JWE Encrypted Key segment (empty for `dir`)
    pub encrypted_key: Vec<u8>,
}

/// JWE key management
pub trait KeyWrapper: Send + Sync {
    /// Descriptor of the implemented algorithm
    fn algorithm(&self) -> &Algorithm;

    /// Whether `key` can manage a CEK of `cek_len` bytes, checked before
    /// anything is generated
    ///
    /// # Errors
    /// `JoseError::KeyMismatch` when the key precondition fails
    fn check_key(&self, _cek_len: usize, key: &Key) -> JoseResult<()> {
        self.algorithm().check_key(key, KeyOperation::WrapKey)
    }

    /// Produce a CEK of `cek_len` bytes and its encrypted form
    ///
    /// # Errors
    /// `JoseError::KeyMismatch` when the key precondition fails
    fn wrap(&self, cek_len: usize, key: &Key) -> JoseResult<WrappedKey>;

    /// Recover the CEK from the JWE Encrypted Key
    ///
    /// # Errors
    /// `JoseError::KeyMismatch` for an unusable key, `JoseError::Signature`
    /// when the encrypted key does not authenticate
    fn unwrap(&self, encrypted_key: &[u8], cek_len: usize, key: &Key)
        -> JoseResult<Zeroizing<Vec<u8>>>;
}

/// Ciphertext and authentication tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Ciphertext
    pub ciphertext: Vec<u8>,
    /// Authentication tag
    pub tag: Vec<u8>,
}

/// JWE content encryption (AEAD)
pub trait ContentCipher: Send + Sync {
    /// Descriptor of the implemented algorithm
    fn algorithm(&self) -> &Algorithm;

    /// CEK length in bytes
    fn key_len(&self) -> usize;

    /// IV length in bytes
    fn iv_len(&self) -> usize;

    /// Encrypt and authenticate
    ///
    /// # Errors
    /// `JoseError::KeyMismatch` for a CEK of the wrong length
    fn encrypt(&self, cek: &[u8], iv: &[u8], aad: &[u8], plaintext: &[u8]) -> JoseResult<Sealed>;

    /// Authenticate and decrypt
    ///
    /// # Errors
    /// `JoseError::Signature` when the tag does not verify
    fn decrypt(
        &self,
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> JoseResult<Vec<u8>>;
}

#[derive(Clone)]
struct SignatureEntry {
    signer: Arc<dyn Signer>,
    verifier: Arc<dyn Verifier>,
}

/// Immutable table of algorithm capabilities
///
/// `with_*` methods return an extended copy and leave the receiver untouched.
#[derive(Clone, Default)]
pub struct AlgorithmRegistry {
    signatures: BTreeMap<String, SignatureEntry>,
    key_wrappers: BTreeMap<String, Arc<dyn KeyWrapper>>,
    content_ciphers: BTreeMap<String, Arc<dyn ContentCipher>>,
}

static STANDARD: Lazy<Arc<AlgorithmRegistry>> = Lazy::new(|| {
    let registry = AlgorithmRegistry::empty()
        .with_signature(Unsecured::new())
        .with_signature(HmacSha::hs256())
        .with_signature(HmacSha::hs384())
        .with_signature(HmacSha::hs512())
        .with_signature(RsaSignature::rs256())
        .with_signature(RsaSignature::rs384())
        .with_signature(RsaSignature::rs512())
        .with_signature(RsaSignature::ps256())
        .with_signature(RsaSignature::ps384())
        .with_signature(RsaSignature::ps512())
        .with_signature(Ecdsa::es256())
        .with_signature(Ecdsa::es384())
        .with_key_wrapper(Direct::new())
        .with_key_wrapper(AesKeyWrap::a128kw())
        .with_key_wrapper(AesKeyWrap::a256kw())
        .with_key_wrapper(RsaOaep256::new())
        .with_content_cipher(AesGcm::a128gcm())
        .with_content_cipher(AesGcm::a256gcm());
    Arc::new(registry)
});

impl AlgorithmRegistry {
    /// Registry with nothing in it
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Shared registry holding every built-in algorithm
    #[must_use]
    pub fn standard() -> Arc<AlgorithmRegistry> {
        Arc::clone(&STANDARD)
    }

    /// Copy of this registry with a signature algorithm added (or replaced)
    #[must_use]
    pub fn with_signature<A>(&self, alg: A) -> Self
    where
        A: Signer + Verifier + 'static,
    {
        let id = Signer::algorithm(&alg).id().to_string();
        let alg = Arc::new(alg);
        let mut next = self.clone();
        next.signatures.insert(
            id,
            SignatureEntry {
                signer: alg.clone(),
                verifier: alg,
            },
        );
        next
    }

    /// Copy of this registry with a key-management algorithm added
    #[must_use]
    pub fn with_key_wrapper<W: KeyWrapper + 'static>(&self, wrapper: W) -> Self {
        let mut next = self.clone();
        next.key_wrappers
            .insert(wrapper.algorithm().id().to_string(), Arc::new(wrapper));
        next
    }

    /// Copy of this registry with a content-encryption algorithm added
    #[must_use]
    pub fn with_content_cipher<C: ContentCipher + 'static>(&self, cipher: C) -> Self {
        let mut next = self.clone();
        next.content_ciphers
            .insert(cipher.algorithm().id().to_string(), Arc::new(cipher));
        next
    }

    /// Signer for `id`
    ///
    /// # Errors
    /// `JoseError::UnsupportedAlgorithm` if `id` is not a signature algorithm
    pub fn signer(&self, id: &str) -> JoseResult<&dyn Signer> {
        self.signatures
            .get(id)
            .map(|entry| entry.signer.as_ref())
            .ok_or_else(|| JoseError::unsupported_algorithm(id))
    }

    /// Verifier for `id`
    ///
    /// # Errors
    /// `JoseError::UnsupportedAlgorithm` if `id` is not a signature algorithm
    pub fn verifier(&self, id: &str) -> JoseResult<&dyn Verifier> {
        self.signatures
            .get(id)
            .map(|entry| entry.verifier.as_ref())
            .ok_or_else(|| JoseError::unsupported_algorithm(id))
    }

    /// Key wrapper for `id`
    ///
    /// # Errors
    /// `JoseError::UnsupportedAlgorithm` if `id` is not a key-management algorithm
    pub fn key_wrapper(&self, id: &str) -> JoseResult<&dyn KeyWrapper> {
        self.key_wrappers
            .get(id)
            .map(|wrapper| wrapper.as_ref())
            .ok_or_else(|| JoseError::unsupported_algorithm(id))
    }

    /// Content cipher for `id`
    ///
    /// # Errors
    /// `JoseError::UnsupportedAlgorithm` if `id` is not a content-encryption algorithm
    pub fn content_cipher(&self, id: &str) -> JoseResult<&dyn ContentCipher> {
        self.content_ciphers
            .get(id)
            .map(|cipher| cipher.as_ref())
            .ok_or_else(|| JoseError::unsupported_algorithm(id))
    }

    /// Descriptor for `id` under any capability
    #[must_use]
    pub fn algorithm(&self, id: &str) -> Option<&Algorithm> {
        if let Some(entry) = self.signatures.get(id) {
            return Some(entry.signer.algorithm());
        }
        if let Some(wrapper) = self.key_wrappers.get(id) {
            return Some(wrapper.algorithm());
        }
        self.content_ciphers.get(id).map(|c| c.algorithm())
    }

    /// Whether `id` is registered under any capability
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.algorithm(id).is_some()
    }

    /// Every registered identifier, sorted, duplicates removed
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        let mut ids: Vec<&str> = self
            .signatures
            .keys()
            .chain(self.key_wrappers.keys())
            .chain(self.content_ciphers.keys())
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
    }
}

impl fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("signatures", &self.signatures.keys().collect::<Vec<_>>())
            .field("key_wrappers", &self.key_wrappers.keys().collect::<Vec<_>>())
            .field(
                "content_ciphers",
                &self.content_ciphers.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
