//! Security policy: which algorithms may be used and how claims are judged
//!
//! A policy is a value. Every `with_*` transform returns a new policy and
//! leaves the receiver untouched, so one default can be shared freely.

use crate::{
    algorithms::{AlgorithmRegistry, NONE},
    error::{JoseError, JoseResult},
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Decode and build constraints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    permitted: BTreeSet<String>,
    skew: Duration,
    required_claims: BTreeSet<String>,
    expected_issuer: Option<String>,
    expected_audience: Option<String>,
    max_age: Option<Duration>,
    critical_extensions: BTreeSet<String>,
}

impl Default for SecurityPolicy {
    /// Every standard algorithm except `none`, zero skew, no required claims
    fn default() -> Self {
        Self::for_registry(&AlgorithmRegistry::standard())
    }
}

impl SecurityPolicy {
    /// Default policy over a custom registry: everything it holds except `none`
    #[must_use]
    pub fn for_registry(registry: &AlgorithmRegistry) -> Self {
        Self {
            permitted: registry
                .identifiers()
                .filter(|id| *id != NONE)
                .map(str::to_string)
                .collect(),
            skew: Duration::zero(),
            required_claims: BTreeSet::new(),
            expected_issuer: None,
            expected_audience: None,
            max_age: None,
            critical_extensions: BTreeSet::new(),
        }
    }

    /// Build from configuration, starting at the default
    ///
    /// # Errors
    /// `JoseError::UnsupportedAlgorithm` for a permitted algorithm the
    /// standard registry does not know
    pub fn from_config(config: &PolicyConfig) -> JoseResult<Self> {
        Self::from_config_with_registry(config, &AlgorithmRegistry::standard())
    }

    /// Build from configuration against a custom registry
    ///
    /// # Errors
    /// `JoseError::UnsupportedAlgorithm` for a permitted algorithm `registry`
    /// does not know
    pub fn from_config_with_registry(
        config: &PolicyConfig,
        registry: &AlgorithmRegistry,
    ) -> JoseResult<Self> {
        let mut policy = Self::for_registry(registry);
        if let Some(algorithms) = &config.permitted_algorithms {
            if let Some(unknown) = algorithms.iter().find(|id| !registry.contains(id)) {
                return Err(JoseError::unsupported_algorithm(unknown.clone()));
            }
            policy = policy.with_permitted_algorithms(algorithms.iter().cloned());
        }
        if let Some(allow_none) = config.allow_none {
            policy = policy.with_allow_none(allow_none);
        }
        policy.skew = seconds(config.skew_seconds);
        policy.required_claims = config.required_claims.iter().cloned().collect();
        policy.expected_issuer = config.expected_issuer.clone();
        policy.expected_audience = config.expected_audience.clone();
        policy.max_age = config.max_age_seconds.map(seconds);
        policy.critical_extensions = config.critical_extensions.iter().cloned().collect();
        Ok(policy)
    }

    /// Whether `alg` may be used
    #[must_use]
    pub fn permits(&self, alg: &str) -> bool {
        self.permitted.contains(alg)
    }

    /// Whether `none` may be used; true only once `none` is permitted
    #[must_use]
    pub fn allows_none(&self) -> bool {
        self.permits(NONE)
    }

    /// Permitted identifiers, sorted
    pub fn permitted_algorithms(&self) -> impl Iterator<Item = &str> {
        self.permitted.iter().map(String::as_str)
    }

    /// Clock skew tolerance for time-based claims
    #[must_use]
    pub fn skew(&self) -> Duration {
        self.skew
    }

    /// Claims that must be present
    pub fn required_claims(&self) -> impl Iterator<Item = &str> {
        self.required_claims.iter().map(String::as_str)
    }

    /// Required `iss` value
    #[must_use]
    pub fn expected_issuer(&self) -> Option<&str> {
        self.expected_issuer.as_deref()
    }

    /// Audience `aud` must contain
    #[must_use]
    pub fn expected_audience(&self) -> Option<&str> {
        self.expected_audience.as_deref()
    }

    /// Oldest acceptable `iat`, relative to now
    #[must_use]
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Whether `name` is an understood critical header extension
    #[must_use]
    pub fn understands_extension(&self, name: &str) -> bool {
        self.critical_extensions.contains(name)
    }

    /// Without `alg`
    #[must_use]
    pub fn with_algorithm_removed(&self, alg: &str) -> Self {
        let mut next = self.clone();
        next.permitted.remove(alg);
        next
    }

    /// With `alg` added; adding `none` is how unsecured tokens are enabled
    #[must_use]
    pub fn with_algorithm_added(&self, alg: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.permitted.insert(alg.into());
        next
    }

    /// With exactly these algorithms permitted
    #[must_use]
    pub fn with_permitted_algorithms<I, S>(&self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.permitted = algorithms.into_iter().map(Into::into).collect();
        next
    }

    /// With `none` permitted or not
    #[must_use]
    pub fn with_allow_none(&self, allow: bool) -> Self {
        if allow {
            self.with_algorithm_added(NONE)
        } else {
            self.with_algorithm_removed(NONE)
        }
    }

    /// With a clock skew tolerance; negative values count as zero
    #[must_use]
    pub fn with_skew(&self, skew: Duration) -> Self {
        let mut next = self.clone();
        next.skew = skew.max(Duration::zero());
        next
    }

    /// With `claim` required
    #[must_use]
    pub fn with_required_claim(&self, claim: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.required_claims.insert(claim.into());
        next
    }

    /// With an expected issuer
    #[must_use]
    pub fn with_expected_issuer(&self, issuer: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.expected_issuer = Some(issuer.into());
        next
    }

    /// With an expected audience
    #[must_use]
    pub fn with_expected_audience(&self, audience: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.expected_audience = Some(audience.into());
        next
    }

    /// With a maximum token age measured from `iat`
    #[must_use]
    pub fn with_max_age(&self, max_age: Duration) -> Self {
        let mut next = self.clone();
        next.max_age = Some(max_age);
        next
    }

    /// With `name` accepted in `crit`
    #[must_use]
    pub fn with_critical_extension(&self, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.critical_extensions.insert(name.into());
        next
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Deserializable policy settings
///
/// ```json
/// { "permitted_algorithms": ["ES256"], "skew_seconds": 30, "required_claims": ["sub"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Add or remove `none`; unset keeps whatever the permitted list says
    pub allow_none: Option<bool>,
    /// Replace the permitted set; unset keeps the default
    pub permitted_algorithms: Option<Vec<String>>,
    /// Clock skew in seconds
    pub skew_seconds: u64,
    /// Claims that must be present
    pub required_claims: Vec<String>,
    /// Required `iss`
    pub expected_issuer: Option<String>,
    /// Required `aud` member
    pub expected_audience: Option<String>,
    /// Maximum age from `iat`, in seconds
    pub max_age_seconds: Option<u64>,
    /// Understood critical header extensions
    pub critical_extensions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_excludes_none() {
        let policy = SecurityPolicy::default();
        assert!(!policy.allows_none());
        assert!(policy.permits("HS256"));
        assert!(policy.permits("A256GCM"));
        assert_eq!(policy.skew(), Duration::zero());
    }

    #[test]
    fn transforms_do_not_touch_the_receiver() {
        let base = SecurityPolicy::default();
        let with_none = base.with_algorithm_added("none");
        let without_hs = base.with_algorithm_removed("HS256");
        let skewed = base.with_skew(Duration::seconds(5));

        assert!(with_none.allows_none());
        assert!(!without_hs.permits("HS256"));
        assert_eq!(skewed.skew(), Duration::seconds(5));
        assert_eq!(base, SecurityPolicy::default());
    }

    #[test]
    fn negative_skew_clamps_to_zero() {
        let policy = SecurityPolicy::default().with_skew(Duration::seconds(-3));
        assert_eq!(policy.skew(), Duration::zero());
    }

    #[test]
    fn config_rejects_unknown_algorithms_and_fields() {
        let config: PolicyConfig =
            serde_json::from_str(r#"{"permitted_algorithms":["HS256","XX999"]}"#).unwrap();
        assert_eq!(
            SecurityPolicy::from_config(&config).unwrap_err(),
            JoseError::UnsupportedAlgorithm("XX999".into())
        );
        assert!(serde_json::from_str::<PolicyConfig>(r#"{"leeway":5}"#).is_err());
    }

    #[test]
    fn config_builds_policy() {
        let config: PolicyConfig = serde_json::from_str(
            r#"{"permitted_algorithms":["ES256"],"allow_none":true,"skew_seconds":30,
                "required_claims":["sub"],"expected_issuer":"https://issuer",
                "max_age_seconds":600,"critical_extensions":["b64"]}"#,
        )
        .unwrap();
        let policy = SecurityPolicy::from_config(&config).unwrap();
        assert_eq!(policy.permitted_algorithms().collect::<Vec<_>>(), ["ES256", "none"]);
        assert_eq!(policy.skew(), Duration::seconds(30));
        assert_eq!(policy.required_claims().collect::<Vec<_>>(), ["sub"]);
        assert_eq!(policy.expected_issuer(), Some("https://issuer"));
        assert_eq!(policy.max_age(), Some(Duration::seconds(600)));
        assert!(policy.understands_extension("b64"));
    }
}
