//! Registered-claim validation
//!
//! Pure: the current time comes in as an argument and every violation is
//! returned, not just the first.

use super::ClaimSet;
use crate::{
    error::{ClaimViolation, JoseError},
    policy::SecurityPolicy,
};
use chrono::{DateTime, Utc};

/// Check `claims` at `now` against the policy
#[must_use]
pub fn validate_claims(
    claims: &ClaimSet,
    now: DateTime<Utc>,
    policy: &SecurityPolicy,
) -> Vec<JoseError> {
    let now = now.timestamp();
    let skew = policy.skew().num_seconds();
    let mut violations = Vec::new();

    if let Some(exp) = claims.exp {
        if now > exp.saturating_add(skew) {
            violations.push(ClaimViolation::Expired);
        }
    }
    if let Some(nbf) = claims.nbf {
        if now < nbf.saturating_sub(skew) {
            violations.push(ClaimViolation::NotYetValid);
        }
    }
    if let Some(iat) = claims.iat {
        if iat > now.saturating_add(skew) {
            violations.push(ClaimViolation::IssuedInFuture);
        }
    }

    if let Some(max_age) = policy.max_age() {
        match claims.iat {
            Some(iat) => {
                let limit = max_age.num_seconds().saturating_add(skew);
                if now.saturating_sub(iat) > limit {
                    violations.push(ClaimViolation::TooOld);
                }
            }
            None if !policy.required_claims().any(|c| c == "iat") => {
                violations.push(ClaimViolation::MissingClaim("iat".to_string()));
            }
            None => {}
        }
    }

    for name in policy.required_claims() {
        if !claims.contains(name) {
            violations.push(ClaimViolation::MissingClaim(name.to_string()));
        }
    }

    if let Some(issuer) = policy.expected_issuer() {
        if claims.iss.as_deref() != Some(issuer) {
            violations.push(ClaimViolation::IssuerMismatch);
        }
    }
    if let Some(audience) = policy.expected_audience() {
        if !claims.aud.as_ref().is_some_and(|aud| aud.contains(audience)) {
            violations.push(ClaimViolation::AudienceMismatch);
        }
    }

    violations.into_iter().map(JoseError::from).collect()
}
