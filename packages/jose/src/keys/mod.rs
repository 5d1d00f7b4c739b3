//! Key model
//!
//! A [`Key`] couples raw key material with the JWK metadata the engine
//! enforces: `kid`, `use`, `key_ops` and an optional `alg` hint. Usage
//! metadata is checked once, when the key is built, so an inconsistent key
//! never reaches a signer or verifier.

mod jwk;
mod key_set;

pub use jwk::{Jwk, JwkSet};
pub use key_set::{KeyResolver, KeySet};

use crate::{
    encoding::base64_url_encode,
    error::{JoseError, JoseResult},
};
use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    traits::PublicKeyParts,
    RsaPrivateKey, RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// The `kty` family of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyType {
    /// Symmetric octet sequence (`oct`)
    Oct,
    /// RSA public or private key
    Rsa,
    /// Elliptic-curve public or private key
    Ec,
}

impl KeyType {
    /// JWK `kty` value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::Oct => "oct",
            KeyType::Rsa => "RSA",
            KeyType::Ec => "EC",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported elliptic curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcCurve {
    /// NIST P-256
    #[serde(rename = "P-256")]
    P256,
    /// NIST P-384
    #[serde(rename = "P-384")]
    P384,
}

impl EcCurve {
    /// JWK `crv` value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::P384 => "P-384",
        }
    }

    /// Length of one affine coordinate (and of the private scalar)
    #[must_use]
    pub fn coordinate_len(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(EcCurve::P256),
            "P-384" => Some(EcCurve::P384),
            _ => None,
        }
    }
}

/// JWK `use` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUse {
    /// `sig`
    #[serde(rename = "sig")]
    Signature,
    /// `enc`
    #[serde(rename = "enc")]
    Encryption,
}

impl KeyUse {
    /// JWK `use` value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KeyUse::Signature => "sig",
            KeyUse::Encryption => "enc",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "sig" => Some(KeyUse::Signature),
            "enc" => Some(KeyUse::Encryption),
            _ => None,
        }
    }
}

/// JWK `key_ops` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyOperation {
    /// Compute a signature or MAC
    Sign,
    /// Verify a signature or MAC
    Verify,
    /// Encrypt content
    Encrypt,
    /// Decrypt content
    Decrypt,
    /// Encrypt a content-encryption key
    WrapKey,
    /// Decrypt a content-encryption key
    UnwrapKey,
    /// Derive a key
    DeriveKey,
    /// Derive bits not used as a key
    DeriveBits,
}

impl KeyOperation {
    /// JWK `key_ops` value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KeyOperation::Sign => "sign",
            KeyOperation::Verify => "verify",
            KeyOperation::Encrypt => "encrypt",
            KeyOperation::Decrypt => "decrypt",
            KeyOperation::WrapKey => "wrapKey",
            KeyOperation::UnwrapKey => "unwrapKey",
            KeyOperation::DeriveKey => "deriveKey",
            KeyOperation::DeriveBits => "deriveBits",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sign" => KeyOperation::Sign,
            "verify" => KeyOperation::Verify,
            "encrypt" => KeyOperation::Encrypt,
            "decrypt" => KeyOperation::Decrypt,
            "wrapKey" => KeyOperation::WrapKey,
            "unwrapKey" => KeyOperation::UnwrapKey,
            "deriveKey" => KeyOperation::DeriveKey,
            "deriveBits" => KeyOperation::DeriveBits,
            _ => return None,
        })
    }

    /// The `use` class an operation belongs to
    #[must_use]
    pub fn key_use(self) -> KeyUse {
        match self {
            KeyOperation::Sign | KeyOperation::Verify => KeyUse::Signature,
            _ => KeyUse::Encryption,
        }
    }
}

/// Elliptic-curve public key
#[derive(Debug, Clone)]
pub enum EcPublicKey {
    /// P-256 verifying key
    P256(p256::ecdsa::VerifyingKey),
    /// P-384 verifying key
    P384(p384::ecdsa::VerifyingKey),
}

impl EcPublicKey {
    /// Curve of this key
    #[must_use]
    pub fn curve(&self) -> EcCurve {
        match self {
            EcPublicKey::P256(_) => EcCurve::P256,
            EcPublicKey::P384(_) => EcCurve::P384,
        }
    }

    /// Affine `(x, y)` coordinates, big-endian, fixed length
    fn coordinates(&self) -> (Vec<u8>, Vec<u8>) {
        match self {
            EcPublicKey::P256(k) => {
                let point = k.to_encoded_point(false);
                (
                    point.x().map(|x| x.to_vec()).unwrap_or_default(),
                    point.y().map(|y| y.to_vec()).unwrap_or_default(),
                )
            }
            EcPublicKey::P384(k) => {
                let point = k.to_encoded_point(false);
                (
                    point.x().map(|x| x.to_vec()).unwrap_or_default(),
                    point.y().map(|y| y.to_vec()).unwrap_or_default(),
                )
            }
        }
    }
}

/// Elliptic-curve private key
#[derive(Clone)]
pub enum EcPrivateKey {
    /// P-256 signing key
    P256(p256::ecdsa::SigningKey),
    /// P-384 signing key
    P384(p384::ecdsa::SigningKey),
}

impl EcPrivateKey {
    /// Curve of this key
    #[must_use]
    pub fn curve(&self) -> EcCurve {
        match self {
            EcPrivateKey::P256(_) => EcCurve::P256,
            EcPrivateKey::P384(_) => EcCurve::P384,
        }
    }

    /// Matching public key
    #[must_use]
    pub fn public_key(&self) -> EcPublicKey {
        match self {
            EcPrivateKey::P256(k) => EcPublicKey::P256(*k.verifying_key()),
            EcPrivateKey::P384(k) => EcPublicKey::P384(*k.verifying_key()),
        }
    }
}

/// Raw key material
#[derive(Clone)]
pub enum KeyMaterial {
    /// Symmetric secret, zeroized on drop
    Octet(Zeroizing<Vec<u8>>),
    /// RSA public key
    RsaPublic(RsaPublicKey),
    /// RSA private key
    RsaPrivate(Box<RsaPrivateKey>),
    /// EC public key
    EcPublic(EcPublicKey),
    /// EC private key
    EcPrivate(EcPrivateKey),
}

impl KeyMaterial {
    /// Symmetric secret from raw bytes
    #[must_use]
    pub fn octet(secret: impl Into<Vec<u8>>) -> Self {
        KeyMaterial::Octet(Zeroizing::new(secret.into()))
    }

    /// RSA private key from PKCS#8 DER
    ///
    /// # Errors
    /// Returns `JoseError::InvalidKey` if the DER does not hold an RSA private key
    pub fn rsa_private_from_pkcs8_der(der: &[u8]) -> JoseResult<Self> {
        let key = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| JoseError::invalid_key(format!("Invalid RSA private key: {e}")))?;
        Ok(KeyMaterial::RsaPrivate(Box::new(key)))
    }

    /// RSA public key from SPKI DER
    ///
    /// # Errors
    /// Returns `JoseError::InvalidKey` if the DER does not hold an RSA public key
    pub fn rsa_public_from_spki_der(der: &[u8]) -> JoseResult<Self> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| JoseError::invalid_key(format!("Invalid RSA public key: {e}")))?;
        Ok(KeyMaterial::RsaPublic(key))
    }

    /// EC private key from PKCS#8 DER
    ///
    /// # Errors
    /// Returns `JoseError::InvalidKey` if the DER does not hold a key on `curve`
    pub fn ec_private_from_pkcs8_der(curve: EcCurve, der: &[u8]) -> JoseResult<Self> {
        let key = match curve {
            EcCurve::P256 => p256::ecdsa::SigningKey::from_pkcs8_der(der)
                .map(EcPrivateKey::P256)
                .map_err(|e| JoseError::invalid_key(format!("Invalid P-256 private key: {e}")))?,
            EcCurve::P384 => p384::ecdsa::SigningKey::from_pkcs8_der(der)
                .map(EcPrivateKey::P384)
                .map_err(|e| JoseError::invalid_key(format!("Invalid P-384 private key: {e}")))?,
        };
        Ok(KeyMaterial::EcPrivate(key))
    }

    /// EC public key from SPKI DER
    ///
    /// # Errors
    /// Returns `JoseError::InvalidKey` if the DER does not hold a key on `curve`
    pub fn ec_public_from_spki_der(curve: EcCurve, der: &[u8]) -> JoseResult<Self> {
        let key = match curve {
            EcCurve::P256 => p256::ecdsa::VerifyingKey::from_public_key_der(der)
                .map(EcPublicKey::P256)
                .map_err(|e| JoseError::invalid_key(format!("Invalid P-256 public key: {e}")))?,
            EcCurve::P384 => p384::ecdsa::VerifyingKey::from_public_key_der(der)
                .map(EcPublicKey::P384)
                .map_err(|e| JoseError::invalid_key(format!("Invalid P-384 public key: {e}")))?,
        };
        Ok(KeyMaterial::EcPublic(key))
    }

    /// Key type family
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyMaterial::Octet(_) => KeyType::Oct,
            KeyMaterial::RsaPublic(_) | KeyMaterial::RsaPrivate(_) => KeyType::Rsa,
            KeyMaterial::EcPublic(_) | KeyMaterial::EcPrivate(_) => KeyType::Ec,
        }
    }

    /// Key size in bits (secret length, RSA modulus, or curve order)
    #[must_use]
    pub fn size_bits(&self) -> usize {
        match self {
            KeyMaterial::Octet(secret) => secret.len() * 8,
            KeyMaterial::RsaPublic(k) => k.size() * 8,
            KeyMaterial::RsaPrivate(k) => k.size() * 8,
            KeyMaterial::EcPublic(k) => k.curve().coordinate_len() * 8,
            KeyMaterial::EcPrivate(k) => k.curve().coordinate_len() * 8,
        }
    }

    /// Whether the material holds private (or secret) components
    #[must_use]
    pub fn is_private(&self) -> bool {
        matches!(
            self,
            KeyMaterial::Octet(_) | KeyMaterial::RsaPrivate(_) | KeyMaterial::EcPrivate(_)
        )
    }

    /// Curve for EC material
    #[must_use]
    pub fn curve(&self) -> Option<EcCurve> {
        match self {
            KeyMaterial::EcPublic(k) => Some(k.curve()),
            KeyMaterial::EcPrivate(k) => Some(k.curve()),
            _ => None,
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Octet(secret) => write!(f, "Octet(REDACTED, {} bytes)", secret.len()),
            KeyMaterial::RsaPublic(k) => write!(f, "RsaPublic({} bits)", k.size() * 8),
            KeyMaterial::RsaPrivate(k) => write!(f, "RsaPrivate(REDACTED, {} bits)", k.size() * 8),
            KeyMaterial::EcPublic(k) => write!(f, "EcPublic({})", k.curve().as_str()),
            KeyMaterial::EcPrivate(k) => write!(f, "EcPrivate(REDACTED, {})", k.curve().as_str()),
        }
    }
}

/// A validated key: material plus JWK metadata
#[derive(Clone, Debug)]
pub struct Key {
    kid: Option<String>,
    material: KeyMaterial,
    key_use: Option<KeyUse>,
    key_ops: Option<Vec<KeyOperation>>,
    alg: Option<String>,
}

impl Key {
    /// Start building a key around `material`
    #[must_use]
    pub fn builder(material: KeyMaterial) -> KeyBuilder {
        KeyBuilder {
            material,
            kid: None,
            key_use: None,
            key_ops: None,
            alg: None,
        }
    }

    /// Shorthand for a symmetric key builder
    #[must_use]
    pub fn symmetric(secret: impl Into<Vec<u8>>) -> KeyBuilder {
        Self::builder(KeyMaterial::octet(secret))
    }

    /// Key identifier
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Key material
    #[must_use]
    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Key type family
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        self.material.key_type()
    }

    /// Declared `use`
    #[must_use]
    pub fn key_use(&self) -> Option<KeyUse> {
        self.key_use
    }

    /// Declared `key_ops`
    #[must_use]
    pub fn key_ops(&self) -> Option<&[KeyOperation]> {
        self.key_ops.as_deref()
    }

    /// Declared `alg` hint
    #[must_use]
    pub fn algorithm_hint(&self) -> Option<&str> {
        self.alg.as_deref()
    }

    /// Whether the key's metadata allows `op`.
    ///
    /// `key_ops` wins when present, then `use`; a key declaring neither
    /// permits every operation.
    #[must_use]
    pub fn permits(&self, op: KeyOperation) -> bool {
        match (&self.key_ops, self.key_use) {
            (Some(ops), _) => ops.contains(&op),
            (None, Some(key_use)) => op.key_use() == key_use,
            (None, None) => true,
        }
    }

    /// Public half of an asymmetric key, keeping `kid`, `use` and `alg`.
    ///
    /// Private-only operations are dropped from `key_ops`. Returns `None` for
    /// symmetric keys, which have no public form.
    #[must_use]
    pub fn to_public(&self) -> Option<Key> {
        let material = match &self.material {
            KeyMaterial::Octet(_) => return None,
            KeyMaterial::RsaPublic(k) => KeyMaterial::RsaPublic(k.clone()),
            KeyMaterial::RsaPrivate(k) => KeyMaterial::RsaPublic(k.to_public_key()),
            KeyMaterial::EcPublic(k) => KeyMaterial::EcPublic(k.clone()),
            KeyMaterial::EcPrivate(k) => KeyMaterial::EcPublic(k.public_key()),
        };
        let key_ops = self.key_ops.as_ref().map(|ops| {
            ops.iter()
                .copied()
                .filter(|op| {
                    matches!(
                        op,
                        KeyOperation::Verify | KeyOperation::Encrypt | KeyOperation::WrapKey
                    )
                })
                .collect::<Vec<_>>()
        });
        Some(Key {
            kid: self.kid.clone(),
            material,
            key_use: self.key_use,
            key_ops: key_ops.filter(|ops| !ops.is_empty()),
            alg: self.alg.clone(),
        })
    }

    /// RFC 7638 JWK thumbprint (SHA-256, base64url)
    #[must_use]
    pub fn thumbprint_sha256(&self) -> String {
        // Required members only, lexicographic order, no whitespace
        let canonical = match &self.material {
            KeyMaterial::Octet(secret) => {
                format!(r#"{{"k":"{}","kty":"oct"}}"#, base64_url_encode(secret.as_slice()))
            }
            KeyMaterial::RsaPublic(k) => rsa_thumbprint_input(k.n(), k.e()),
            KeyMaterial::RsaPrivate(k) => rsa_thumbprint_input(k.n(), k.e()),
            KeyMaterial::EcPublic(k) => ec_thumbprint_input(k),
            KeyMaterial::EcPrivate(k) => ec_thumbprint_input(&k.public_key()),
        };
        base64_url_encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Public JWK representation
    ///
    /// # Errors
    /// Returns `JoseError::InvalidKey` for symmetric keys
    pub fn to_public_jwk(&self) -> JoseResult<Jwk> {
        let public = self
            .to_public()
            .ok_or_else(|| JoseError::invalid_key("symmetric keys have no public JWK form"))?;
        let mut jwk = Jwk {
            kty: public.key_type().as_str().to_string(),
            kid: public.kid.clone(),
            key_use: public.key_use.map(|u| u.as_str().to_string()),
            key_ops: public
                .key_ops
                .as_ref()
                .map(|ops| ops.iter().map(|op| op.as_str().to_string()).collect()),
            alg: public.alg.clone(),
            ..Jwk::default()
        };
        match &public.material {
            KeyMaterial::RsaPublic(k) => {
                jwk.n = Some(base64_url_encode(k.n().to_bytes_be()));
                jwk.e = Some(base64_url_encode(k.e().to_bytes_be()));
            }
            KeyMaterial::EcPublic(k) => {
                let (x, y) = k.coordinates();
                jwk.crv = Some(k.curve().as_str().to_string());
                jwk.x = Some(base64_url_encode(x));
                jwk.y = Some(base64_url_encode(y));
            }
            _ => return Err(JoseError::invalid_key("unexpected private material")),
        }
        Ok(jwk)
    }
}

fn rsa_thumbprint_input(n: &rsa::BigUint, e: &rsa::BigUint) -> String {
    format!(
        r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#,
        base64_url_encode(e.to_bytes_be()),
        base64_url_encode(n.to_bytes_be())
    )
}

fn ec_thumbprint_input(key: &EcPublicKey) -> String {
    let (x, y) = key.coordinates();
    format!(
        r#"{{"crv":"{}","kty":"EC","x":"{}","y":"{}"}}"#,
        key.curve().as_str(),
        base64_url_encode(x),
        base64_url_encode(y)
    )
}

/// Builder for [`Key`]; validation happens in [`KeyBuilder::build`]
#[derive(Debug)]
#[must_use]
pub struct KeyBuilder {
    material: KeyMaterial,
    kid: Option<String>,
    key_use: Option<KeyUse>,
    key_ops: Option<Vec<KeyOperation>>,
    alg: Option<String>,
}

impl KeyBuilder {
    /// Set the key identifier
    pub fn kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Set the `use` parameter
    pub fn key_use(mut self, key_use: KeyUse) -> Self {
        self.key_use = Some(key_use);
        self
    }

    /// Set the `key_ops` parameter
    pub fn key_ops(mut self, ops: impl IntoIterator<Item = KeyOperation>) -> Self {
        self.key_ops = Some(ops.into_iter().collect());
        self
    }

    /// Set the `alg` hint
    pub fn algorithm(mut self, alg: impl Into<String>) -> Self {
        self.alg = Some(alg.into());
        self
    }

    /// Validate and produce the key
    ///
    /// # Errors
    /// Returns `JoseError::InvalidKey` for an empty `kid` or secret, duplicate
    /// or empty `key_ops`, or `key_ops` that contradict `use`
    pub fn build(self) -> JoseResult<Key> {
        if self.kid.as_deref() == Some("") {
            return Err(JoseError::invalid_key("kid must not be empty"));
        }
        if let KeyMaterial::Octet(secret) = &self.material {
            if secret.is_empty() {
                return Err(JoseError::invalid_key("symmetric key must not be empty"));
            }
        }
        check_key_usage(self.key_use, self.key_ops.as_deref())?;
        Ok(Key {
            kid: self.kid,
            material: self.material,
            key_use: self.key_use,
            key_ops: self.key_ops,
            alg: self.alg,
        })
    }
}

/// `use`/`key_ops` consistency rules (RFC 7517 §4.3)
pub(crate) fn check_key_usage(
    key_use: Option<KeyUse>,
    key_ops: Option<&[KeyOperation]>,
) -> JoseResult<()> {
    let Some(ops) = key_ops else {
        return Ok(());
    };
    if ops.is_empty() {
        return Err(JoseError::invalid_key("key_ops must not be empty"));
    }
    for (i, op) in ops.iter().enumerate() {
        if ops[..i].contains(op) {
            return Err(JoseError::invalid_key(format!(
                "duplicate key operation '{}'",
                op.as_str()
            )));
        }
        if let Some(key_use) = key_use {
            if op.key_use() != key_use {
                return Err(JoseError::invalid_key(format!(
                    "key operation '{}' contradicts use '{}'",
                    op.as_str(),
                    key_use.as_str()
                )));
            }
        }
    }
    Ok(())
}
