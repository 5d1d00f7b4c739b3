//! JOSE token engine
//!
//! Builds and decodes compact JWS and JWE tokens:
//! - HMAC, RSA PKCS#1 v1.5 / PSS and ECDSA signatures
//! - direct, AES key wrap and RSA-OAEP-256 key management with AES-GCM content
//! - explicit security policies, pluggable key resolution and staged decoding
//!   that reports every claim violation

pub mod algorithms;
mod builder;
pub mod claims;
mod clock;
mod decoder;
mod encoding;
mod error;
pub mod keys;
mod outcome;
mod policy;
mod types;
mod zip;

pub use algorithms::{
    Algorithm, AlgorithmFamily, AlgorithmRegistry, ContentCipher, KeyWrapper, Signer, Verifier,
    NONE,
};
pub use builder::{build, Binding, EncrypterBinding, SignerBinding, TokenBuilder};
pub use claims::{
    validate_claims, Audience, ClaimOptions, ClaimSet, ClaimTime, IssuedAt, Nonce,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use decoder::{
    decode, AlgorithmBinding, TokenDecoder, DEFAULT_MAX_DECOMPRESSED_LEN, DEFAULT_MAX_TOKEN_LEN,
};
pub use error::*;
pub use keys::{Jwk, JwkSet, Key, KeyMaterial, KeyResolver, KeySet, KeyType};
pub use outcome::{BuildOutcome, DecodeOutcome, Outcome};
pub use policy::{PolicyConfig, SecurityPolicy};
pub use types::{Header, Integrity, Token};
