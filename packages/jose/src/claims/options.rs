//! Build-time claim options
//!
//! Every registered claim is an explicit field; unregistered claims go
//! through `custom`. The whole structure is validated before anything is
//! serialized.

use super::{Audience, ClaimSet, REGISTERED_CLAIMS};
use crate::{
    algorithms::random_bytes,
    encoding::base64_url_encode,
    error::JoseError,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Length of a generated nonce before encoding
const NONCE_BYTES: usize = 16;

/// Absolute or issue-relative time for `exp` and `nbf`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimTime {
    /// NumericDate
    At(i64),
    /// Offset from the build time
    FromNow(Duration),
}

impl ClaimTime {
    fn resolve(self, now: DateTime<Utc>) -> Option<i64> {
        match self {
            ClaimTime::At(seconds) => Some(seconds),
            ClaimTime::FromNow(offset) => now
                .checked_add_signed(offset)
                .map(|instant| instant.timestamp()),
        }
    }
}

/// `iat` handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssuedAt {
    /// Stamp the build time
    #[default]
    Now,
    /// Use this NumericDate
    At(i64),
    /// Leave `iat` out
    Omit,
}

/// `nonce` handling
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Nonce {
    /// Fresh random nonce per build
    #[default]
    Generate,
    /// Use this value
    Fixed(String),
    /// Leave `nonce` out
    Omit,
}

/// Claims to put in a token
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimOptions {
    /// Token identifier
    pub jti: Option<String>,
    /// Issuer
    pub iss: Option<String>,
    /// Subject
    pub sub: Option<String>,
    /// Audience
    pub aud: Option<Audience>,
    /// Expiration time
    pub exp: Option<ClaimTime>,
    /// Not before
    pub nbf: Option<ClaimTime>,
    /// Issued at
    pub iat: IssuedAt,
    /// Nonce
    pub nonce: Nonce,
    /// Unregistered claims, in insertion order
    pub custom: Vec<(String, Value)>,
}

impl ClaimOptions {
    /// Defaults: generated nonce, `iat` at build time, nothing else
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `jti`
    #[must_use]
    pub fn jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    /// Set `iss`
    #[must_use]
    pub fn issuer(mut self, iss: impl Into<String>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Set `sub`
    #[must_use]
    pub fn subject(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Set `aud`
    #[must_use]
    pub fn audience(mut self, aud: impl Into<Audience>) -> Self {
        self.aud = Some(aud.into());
        self
    }

    /// Set `exp` to a NumericDate
    #[must_use]
    pub fn expires_at(mut self, seconds: i64) -> Self {
        self.exp = Some(ClaimTime::At(seconds));
        self
    }

    /// Set `exp` relative to the build time
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.exp = Some(ClaimTime::FromNow(ttl));
        self
    }

    /// Set `nbf` to a NumericDate
    #[must_use]
    pub fn not_before(mut self, seconds: i64) -> Self {
        self.nbf = Some(ClaimTime::At(seconds));
        self
    }

    /// Set `iat` to a NumericDate
    #[must_use]
    pub fn issued_at(mut self, seconds: i64) -> Self {
        self.iat = IssuedAt::At(seconds);
        self
    }

    /// Leave `iat` out
    #[must_use]
    pub fn without_issued_at(mut self) -> Self {
        self.iat = IssuedAt::Omit;
        self
    }

    /// Use a fixed nonce
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Nonce::Fixed(nonce.into());
        self
    }

    /// Leave `nonce` out
    #[must_use]
    pub fn without_nonce(mut self) -> Self {
        self.nonce = Nonce::Omit;
        self
    }

    /// Add an unregistered claim
    #[must_use]
    pub fn custom(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.push((name.into(), value.into()));
        self
    }

    /// Every problem with these options
    #[must_use]
    pub fn validate(&self) -> Vec<JoseError> {
        let mut errors = Vec::new();
        let mut non_empty = |name: &str, value: Option<&str>| {
            if value == Some("") {
                errors.push(JoseError::invalid_claim(format!("{name} must not be empty")));
            }
        };
        non_empty("jti", self.jti.as_deref());
        non_empty("iss", self.iss.as_deref());
        non_empty("sub", self.sub.as_deref());
        if let Nonce::Fixed(nonce) = &self.nonce {
            non_empty("nonce", Some(nonce));
        }

        match &self.aud {
            Some(Audience::Single(aud)) if aud.is_empty() => {
                errors.push(JoseError::invalid_claim("aud must not be empty"));
            }
            Some(Audience::Multiple(auds)) if auds.is_empty() || auds.iter().any(String::is_empty) => {
                errors.push(JoseError::invalid_claim(
                    "aud must be a non-empty list of non-empty strings",
                ));
            }
            _ => {}
        }

        if let (Some(ClaimTime::At(nbf)), Some(ClaimTime::At(exp))) = (self.nbf, self.exp) {
            if nbf > exp {
                errors.push(JoseError::invalid_claim("nbf is after exp"));
            }
        }

        for (i, (name, _)) in self.custom.iter().enumerate() {
            if name.is_empty() {
                errors.push(JoseError::invalid_claim("custom claim name must not be empty"));
            } else if REGISTERED_CLAIMS.contains(&name.as_str()) {
                errors.push(JoseError::invalid_claim(format!(
                    "custom claim '{name}' shadows a registered claim"
                )));
            } else if self.custom[..i].iter().any(|(earlier, _)| earlier == name) {
                errors.push(JoseError::invalid_claim(format!(
                    "custom claim '{name}' set twice"
                )));
            }
        }
        errors
    }

    /// Validate and produce the claim set for a build at `now`
    ///
    /// # Errors
    /// Every `JoseError::InvalidClaim` found, including times that overflow
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<ClaimSet, Vec<JoseError>> {
        let mut errors = self.validate();

        let mut time = |name: &str, value: Option<ClaimTime>| {
            let resolved = value.map(|t| t.resolve(now));
            if resolved == Some(None) {
                errors.push(JoseError::invalid_claim(format!("{name} is out of range")));
            }
            resolved.flatten()
        };
        let exp = time("exp", self.exp);
        let nbf = time("nbf", self.nbf);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ClaimSet {
            iss: self.iss.clone(),
            sub: self.sub.clone(),
            aud: self.aud.clone(),
            exp,
            nbf,
            iat: match self.iat {
                IssuedAt::Now => Some(now.timestamp()),
                IssuedAt::At(seconds) => Some(seconds),
                IssuedAt::Omit => None,
            },
            jti: self.jti.clone(),
            nonce: match &self.nonce {
                Nonce::Generate => Some(base64_url_encode(random_bytes(NONCE_BYTES).as_slice())),
                Nonce::Fixed(nonce) => Some(nonce.clone()),
                Nonce::Omit => None,
            },
            extra: self.custom.iter().cloned().collect::<BTreeMap<_, _>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};

    #[test]
    fn defaults_stamp_iat_and_nonce() {
        let now = FixedClock::at_timestamp(1_000).now();
        let claims = ClaimOptions::new().jti("10").resolve(now).unwrap();
        assert_eq!(claims.jti.as_deref(), Some("10"));
        assert_eq!(claims.iat, Some(1_000));
        assert_eq!(claims.nonce.as_ref().map(String::len), Some(22));

        let other = ClaimOptions::new().resolve(now).unwrap();
        assert_ne!(claims.nonce, other.nonce);
    }

    #[test]
    fn defaults_can_be_suppressed() {
        let now = FixedClock::at_timestamp(1_000).now();
        let claims = ClaimOptions::new()
            .without_nonce()
            .without_issued_at()
            .expires_in(Duration::seconds(60))
            .resolve(now)
            .unwrap();
        assert!(claims.nonce.is_none());
        assert!(claims.iat.is_none());
        assert_eq!(claims.exp, Some(1_060));
    }

    #[test]
    fn all_problems_are_reported_together() {
        let errors = ClaimOptions::new()
            .jti("")
            .custom("exp", 5)
            .custom("role", "a")
            .custom("role", "b")
            .not_before(10)
            .expires_at(5)
            .validate();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().all(|e| matches!(e, JoseError::InvalidClaim(_))));
    }
}
