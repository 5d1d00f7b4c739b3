//! Token header and decoded token types

use crate::claims::ClaimSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Header parameters the engine interprets itself; these may never be
/// listed in `crit`
pub(crate) const REGISTERED_HEADER_PARAMS: &[&str] = &[
    "alg", "enc", "zip", "typ", "cty", "kid", "jku", "jwk", "x5u", "x5c", "x5t", "x5t#S256",
    "crit",
];

/// JOSE protected header
///
/// Fields serialize in declaration order followed by extension parameters
/// in key order, so the same header always encodes to the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Signature or key-management algorithm
    pub alg: String,
    /// Content-encryption algorithm (JWE only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc: Option<String>,
    /// Compression applied before encryption (JWE only, `DEF`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    /// Media type of the whole token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Media type of the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
    /// Key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// JWK Set URL; exposed to callers, never fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jku: Option<String>,
    /// Extensions the recipient must understand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,
    /// Extension parameters
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Header {
    /// Header naming `alg` and nothing else
    #[must_use]
    pub fn new(alg: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            ..Self::default()
        }
    }

    /// Whether this is a JWE header
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.enc.is_some()
    }
}

/// Integrity material carried by a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integrity {
    /// JWS signature or MAC (empty for `none`)
    Signature(Vec<u8>),
    /// JWE key and authentication material
    Encryption {
        /// Encrypted CEK (empty for `dir`)
        encrypted_key: Vec<u8>,
        /// Initialization vector
        iv: Vec<u8>,
        /// Authentication tag
        tag: Vec<u8>,
    },
}

/// Decoded token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    header: Header,
    claims: ClaimSet,
    integrity: Integrity,
    compact: String,
}

impl Token {
    pub(crate) fn new(header: Header, claims: ClaimSet, integrity: Integrity, compact: String) -> Self {
        Self {
            header,
            claims,
            integrity,
            compact,
        }
    }

    /// Protected header
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Claims carried in the payload
    #[must_use]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Signature or JWE integrity material
    #[must_use]
    pub fn integrity(&self) -> &Integrity {
        &self.integrity
    }

    /// Compact serialization this token was decoded from
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.compact
    }

    /// Take the claims
    #[must_use]
    pub fn into_claims(self) -> ClaimSet {
        self.claims
    }
}
