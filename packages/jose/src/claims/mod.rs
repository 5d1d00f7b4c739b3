//! Claims: the decoded claim set, build-time claim options and validation

mod options;
mod validation;

pub use options::{ClaimOptions, ClaimTime, IssuedAt, Nonce};
pub use validation::validate_claims;

use crate::error::ClaimViolation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Registered claim names handled as typed fields
pub const REGISTERED_CLAIMS: &[&str] = &["iss", "sub", "aud", "exp", "nbf", "iat", "jti", "nonce"];

/// `aud`: a single string or an array of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// One recipient
    Single(String),
    /// Several recipients
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `audience` is among the recipients
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

impl From<&str> for Audience {
    fn from(aud: &str) -> Self {
        Audience::Single(aud.to_string())
    }
}

impl From<String> for Audience {
    fn from(aud: String) -> Self {
        Audience::Single(aud)
    }
}

impl From<Vec<String>> for Audience {
    fn from(auds: Vec<String>) -> Self {
        Audience::Multiple(auds)
    }
}

/// Claims carried by a token
///
/// Times are NumericDate seconds since the epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiration time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Not before
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Token identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Replay nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Unregistered claims, passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ClaimSet {
    /// Read a JSON object leniently: a registered claim of the wrong type is
    /// left unset and reported, everything else is kept
    #[must_use]
    pub fn from_json_map(map: Map<String, Value>) -> (Self, Vec<ClaimViolation>) {
        let mut claims = ClaimSet::default();
        let mut violations = Vec::new();

        for (name, value) in map {
            match name.as_str() {
                "iss" => claims.iss = string_claim(&name, value, &mut violations),
                "sub" => claims.sub = string_claim(&name, value, &mut violations),
                "jti" => claims.jti = string_claim(&name, value, &mut violations),
                "nonce" => claims.nonce = string_claim(&name, value, &mut violations),
                "exp" => claims.exp = date_claim(&name, &value, &mut violations),
                "nbf" => claims.nbf = date_claim(&name, &value, &mut violations),
                "iat" => claims.iat = date_claim(&name, &value, &mut violations),
                "aud" => match serde_json::from_value::<Audience>(value) {
                    Ok(aud) => claims.aud = Some(aud),
                    Err(_) => violations.push(ClaimViolation::InvalidType {
                        claim: name,
                        expected: "a string or an array of strings",
                    }),
                },
                _ => {
                    claims.extra.insert(name, value);
                }
            }
        }
        (claims, violations)
    }

    /// Canonical JSON object: keys sorted, absent claims omitted
    #[must_use]
    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let mut put = |name: &str, value: Option<Value>| {
            if let Some(value) = value {
                map.insert(name.to_string(), value);
            }
        };
        put("iss", self.iss.clone().map(Value::from));
        put("sub", self.sub.clone().map(Value::from));
        put(
            "aud",
            self.aud.as_ref().map(|aud| match aud {
                Audience::Single(aud) => Value::from(aud.clone()),
                Audience::Multiple(auds) => Value::from(auds.clone()),
            }),
        );
        put("exp", self.exp.map(Value::from));
        put("nbf", self.nbf.map(Value::from));
        put("iat", self.iat.map(Value::from));
        put("jti", self.jti.clone().map(Value::from));
        put("nonce", self.nonce.clone().map(Value::from));
        for (name, value) in &self.extra {
            map.insert(name.clone(), value.clone());
        }
        map
    }

    /// Whether `name` (registered or not) is present
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        match name {
            "iss" => self.iss.is_some(),
            "sub" => self.sub.is_some(),
            "aud" => self.aud.is_some(),
            "exp" => self.exp.is_some(),
            "nbf" => self.nbf.is_some(),
            "iat" => self.iat.is_some(),
            "jti" => self.jti.is_some(),
            "nonce" => self.nonce.is_some(),
            other => self.extra.contains_key(other),
        }
    }

    /// Unregistered claim by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

fn string_claim(name: &str, value: Value, violations: &mut Vec<ClaimViolation>) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        _ => {
            violations.push(ClaimViolation::InvalidType {
                claim: name.to_string(),
                expected: "a string",
            });
            None
        }
    }
}

// NumericDate may carry a fraction; it is truncated to whole seconds
fn date_claim(name: &str, value: &Value, violations: &mut Vec<ClaimViolation>) -> Option<i64> {
    let seconds = value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f.trunc() as i64)
    });
    if seconds.is_none() {
        violations.push(ClaimViolation::InvalidType {
            claim: name.to_string(),
            expected: "a NumericDate",
        });
    }
    seconds
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn lenient_parse_reports_every_type_error() {
        let (claims, violations) = ClaimSet::from_json_map(object(json!({
            "iss": 5,
            "exp": "tomorrow",
            "aud": ["a", 1],
            "sub": "alice",
            "role": "admin"
        })));
        assert_eq!(claims.sub.as_deref(), Some("alice"));
        assert_eq!(claims.get("role"), Some(&json!("admin")));
        assert!(claims.iss.is_none() && claims.exp.is_none() && claims.aud.is_none());
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn fractional_dates_truncate() {
        let (claims, violations) = ClaimSet::from_json_map(object(json!({"exp": 1_700_000_000.9})));
        assert!(violations.is_empty());
        assert_eq!(claims.exp, Some(1_700_000_000));
    }

    #[test]
    fn audience_forms() {
        let (claims, _) = ClaimSet::from_json_map(object(json!({"aud": "api"})));
        assert_eq!(claims.aud, Some(Audience::Single("api".into())));
        let aud = Audience::Multiple(vec!["a".into(), "b".into()]);
        assert!(aud.contains("b"));
        assert!(!aud.contains("c"));
    }

    #[test]
    fn json_map_round_trip_is_sorted() {
        let mut claims = ClaimSet {
            sub: Some("s".into()),
            jti: Some("10".into()),
            iat: Some(1),
            ..ClaimSet::default()
        };
        claims.extra.insert("a".into(), json!(true));
        let map = claims.to_json_map();
        assert_eq!(map.keys().collect::<Vec<_>>(), ["a", "iat", "jti", "sub"]);
        let (back, violations) = ClaimSet::from_json_map(map);
        assert!(violations.is_empty());
        assert_eq!(back, claims);
    }
}
