//! Key sets and key resolution

use super::{JwkSet, Key, KeyType};
use crate::error::{JoseError, JoseResult};
use std::sync::Arc;

/// Source of verification keys for the decoder.
///
/// Implementations hand back keys that are already resolved; the decoder
/// never performs I/O on its own behalf.
pub trait KeyResolver: Send + Sync {
    /// Select the key for a token header `kid` and the key type the
    /// algorithm family requires
    ///
    /// # Errors
    /// Returns `JoseError::KeyResolution` if no unique key matches
    fn resolve(&self, kid: Option<&str>, key_type: KeyType) -> JoseResult<Arc<Key>>;
}

/// Ordered, immutable collection of validated keys
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<Arc<Key>>,
}

impl KeySet {
    /// Build a key set
    ///
    /// # Errors
    /// Returns `JoseError::InvalidKey` if two keys share both `kid` and key type
    pub fn new(keys: impl IntoIterator<Item = Key>) -> JoseResult<Self> {
        let mut set: Vec<Arc<Key>> = Vec::new();
        for key in keys {
            if let Some(kid) = key.kid() {
                let clash = set
                    .iter()
                    .any(|k| k.kid() == Some(kid) && k.key_type() == key.key_type());
                if clash {
                    return Err(JoseError::invalid_key(format!(
                        "duplicate {} key with kid '{kid}'",
                        key.key_type()
                    )));
                }
            }
            set.push(Arc::new(key));
        }
        Ok(Self { keys: set })
    }

    /// Import a parsed JWK Set
    ///
    /// # Errors
    /// Fails on the first member that [`Key::from_jwk`] rejects, or on
    /// duplicate `(kid, kty)` pairs
    pub fn from_jwk_set(set: &JwkSet) -> JoseResult<Self> {
        let keys = set
            .keys
            .iter()
            .map(Key::from_jwk)
            .collect::<JoseResult<Vec<_>>>()?;
        Self::new(keys)
    }

    /// Import a JWK Set document
    ///
    /// # Errors
    /// Returns `JoseError::Serialization` for malformed JSON, otherwise as
    /// [`KeySet::from_jwk_set`]
    pub fn from_jwk_set_json(json: &str) -> JoseResult<Self> {
        let set: JwkSet = serde_json::from_str(json)?;
        Self::from_jwk_set(&set)
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Key>> {
        self.keys.iter()
    }
}

impl KeyResolver for KeySet {
    fn resolve(&self, kid: Option<&str>, key_type: KeyType) -> JoseResult<Arc<Key>> {
        let Some(kid) = kid else {
            return match self.keys.as_slice() {
                [only] if only.key_type() == key_type => Ok(Arc::clone(only)),
                [only] => Err(JoseError::key_resolution(format!(
                    "only key is {}, algorithm needs {key_type}",
                    only.key_type()
                ))),
                [] => Err(JoseError::key_resolution("key set is empty")),
                keys => Err(JoseError::key_resolution(format!(
                    "token has no kid and the key set holds {} keys",
                    keys.len()
                ))),
            };
        };

        let mut named = self.keys.iter().filter(|k| k.kid() == Some(kid)).peekable();
        if named.peek().is_none() {
            return Err(JoseError::key_resolution(format!("unknown kid '{kid}'")));
        }
        let mut typed = named.filter(|k| k.key_type() == key_type);
        match (typed.next(), typed.next()) {
            (Some(key), None) => Ok(Arc::clone(key)),
            (None, _) => Err(JoseError::key_resolution(format!(
                "kid '{kid}' has no {key_type} key"
            ))),
            (Some(_), Some(_)) => Err(JoseError::key_resolution(format!(
                "kid '{kid}' is ambiguous"
            ))),
        }
    }
}

/// A single configured key resolves any header naming it, or no `kid` at all
impl KeyResolver for Arc<Key> {
    fn resolve(&self, kid: Option<&str>, key_type: KeyType) -> JoseResult<Arc<Key>> {
        if let (Some(wanted), Some(own)) = (kid, self.kid()) {
            if wanted != own {
                return Err(JoseError::key_resolution(format!("unknown kid '{wanted}'")));
            }
        }
        if self.key_type() != key_type {
            return Err(JoseError::key_resolution(format!(
                "configured key is {}, algorithm needs {key_type}",
                self.key_type()
            )));
        }
        Ok(Arc::clone(self))
    }
}

impl KeyResolver for Key {
    fn resolve(&self, kid: Option<&str>, key_type: KeyType) -> JoseResult<Arc<Key>> {
        Arc::new(self.clone()).resolve(kid, key_type)
    }
}
