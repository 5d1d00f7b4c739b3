//! JOSE error types

use std::fmt;
use thiserror::Error;

/// JOSE operation result type
pub type JoseResult<T> = Result<T, JoseError>;

/// Every failure the engine can surface to a caller.
///
/// Decode stages 1-5 stop at their first error; claim validation and
/// token building report every problem they find.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoseError {
    /// Malformed segment count, invalid base64url, invalid JSON or an
    /// unrecognized critical extension
    #[error("malformed token: {0}")]
    Structural(String),

    /// Algorithm identifier not present in the registry (or registered
    /// under a different capability)
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key handed to an algorithm whose key precondition it does not meet
    #[error("key mismatch: {0}")]
    KeyMismatch(String),

    /// Algorithm disallowed by the policy or different from the expected one
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// No unique key could be selected
    #[error("key resolution failed: {0}")]
    KeyResolution(String),

    /// Key type the engine does not implement
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Key rejected at construction
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Signature, MAC or authentication tag did not verify
    #[error("integrity check failed")]
    Signature,

    /// Registered-claim check failed on a decoded token
    #[error("claim validation failed: {0}")]
    ClaimValidation(ClaimViolation),

    /// Claim options rejected before building a token
    #[error("invalid claim: {0}")]
    InvalidClaim(String),

    /// Token build requested without a signer or encrypter
    #[error("no signer bound")]
    MissingSigner,

    /// JSON serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Underlying primitive failed for a reason unrelated to the input's integrity
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),
}

impl JoseError {
    /// Create a structural error
    #[inline]
    #[must_use]
    pub fn structural(msg: impl Into<String>) -> Self {
        JoseError::Structural(msg.into())
    }

    /// Create an unsupported algorithm error
    #[inline]
    #[must_use]
    pub fn unsupported_algorithm(alg: impl Into<String>) -> Self {
        JoseError::UnsupportedAlgorithm(alg.into())
    }

    /// Create a key mismatch error
    #[inline]
    #[must_use]
    pub fn key_mismatch(msg: impl Into<String>) -> Self {
        JoseError::KeyMismatch(msg.into())
    }

    /// Create a policy violation error
    #[inline]
    #[must_use]
    pub fn policy_violation(msg: impl Into<String>) -> Self {
        JoseError::PolicyViolation(msg.into())
    }

    /// Create a key resolution error
    #[inline]
    #[must_use]
    pub fn key_resolution(msg: impl Into<String>) -> Self {
        JoseError::KeyResolution(msg.into())
    }

    /// Create an invalid key error
    #[inline]
    #[must_use]
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        JoseError::InvalidKey(msg.into())
    }

    /// Create an invalid claim error
    #[inline]
    #[must_use]
    pub fn invalid_claim(msg: impl Into<String>) -> Self {
        JoseError::InvalidClaim(msg.into())
    }

    /// Coarse classification, handy for matching and for log fields
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            JoseError::Structural(_) => ErrorKind::Structural,
            JoseError::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            JoseError::KeyMismatch(_) => ErrorKind::KeyMismatch,
            JoseError::PolicyViolation(_) => ErrorKind::PolicyViolation,
            JoseError::KeyResolution(_) => ErrorKind::KeyResolution,
            JoseError::UnsupportedKeyType(_) => ErrorKind::UnsupportedKeyType,
            JoseError::InvalidKey(_) => ErrorKind::InvalidKey,
            JoseError::Signature => ErrorKind::Signature,
            JoseError::ClaimValidation(_) => ErrorKind::ClaimValidation,
            JoseError::InvalidClaim(_) => ErrorKind::InvalidClaim,
            JoseError::MissingSigner => ErrorKind::MissingSigner,
            JoseError::Serialization(_) => ErrorKind::Serialization,
            JoseError::Crypto(_) => ErrorKind::Crypto,
        }
    }
}

/// Field-less mirror of [`JoseError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed structure
    Structural,
    /// Unknown algorithm
    UnsupportedAlgorithm,
    /// Key precondition failed
    KeyMismatch,
    /// Policy rejected the algorithm
    PolicyViolation,
    /// No unique key
    KeyResolution,
    /// Unknown key type
    UnsupportedKeyType,
    /// Key rejected at construction
    InvalidKey,
    /// Integrity check failed
    Signature,
    /// Claim check failed
    ClaimValidation,
    /// Claim options rejected
    InvalidClaim,
    /// Nothing to sign with
    MissingSigner,
    /// JSON failure
    Serialization,
    /// Primitive failure
    Crypto,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Reason a decoded claim set was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimViolation {
    /// `exp` is in the past, beyond the allowed skew
    Expired,
    /// `nbf` is in the future, beyond the allowed skew
    NotYetValid,
    /// `iat` is in the future, beyond the allowed skew
    IssuedInFuture,
    /// Policy-required claim is absent
    MissingClaim(String),
    /// Registered claim present with the wrong JSON type
    InvalidType {
        /// Claim name
        claim: String,
        /// Expected JSON type
        expected: &'static str,
    },
    /// `iss` differs from the expected issuer
    IssuerMismatch,
    /// `aud` does not contain the expected audience
    AudienceMismatch,
    /// `iat` is older than the policy's maximum age
    TooOld,
}

impl fmt::Display for ClaimViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimViolation::Expired => f.write_str("expired"),
            ClaimViolation::NotYetValid => f.write_str("not yet valid"),
            ClaimViolation::IssuedInFuture => f.write_str("issued in the future"),
            ClaimViolation::MissingClaim(claim) => write!(f, "missing required claim '{claim}'"),
            ClaimViolation::InvalidType { claim, expected } => {
                write!(f, "claim '{claim}' must be {expected}")
            }
            ClaimViolation::IssuerMismatch => f.write_str("unexpected issuer"),
            ClaimViolation::AudienceMismatch => f.write_str("unexpected audience"),
            ClaimViolation::TooOld => f.write_str("too old"),
        }
    }
}

impl From<ClaimViolation> for JoseError {
    fn from(violation: ClaimViolation) -> Self {
        JoseError::ClaimValidation(violation)
    }
}

impl From<serde_json::Error> for JoseError {
    fn from(e: serde_json::Error) -> Self {
        JoseError::Serialization(e.to_string())
    }
}
