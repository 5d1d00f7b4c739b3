//! Token building: compact JWS and JWE serialization
//!
//! Every precondition is checked before anything is signed or encrypted,
//! and every failure is reported. A build either yields the finished compact
//! string or no string at all.

use crate::{
    algorithms::{random_bytes, AlgorithmRegistry, NONE},
    claims::{ClaimOptions, ClaimSet},
    clock::{Clock, SystemClock},
    encoding::base64_url_encode,
    error::{JoseError, JoseResult},
    keys::{Key, KeyOperation},
    outcome::{BuildOutcome, Outcome},
    policy::SecurityPolicy,
    types::{Header, REGISTERED_HEADER_PARAMS},
    zip,
};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

/// Signature algorithm paired with its signing key
#[derive(Debug, Clone)]
pub struct SignerBinding {
    alg: String,
    key: Option<Arc<Key>>,
}

impl SignerBinding {
    /// Sign with `alg` using `key`
    #[must_use]
    pub fn new(alg: impl Into<String>, key: Arc<Key>) -> Self {
        Self {
            alg: alg.into(),
            key: Some(key),
        }
    }

    /// `alg` with no key yet; building fails with `MissingSigner` unless
    /// `alg` is `none`
    #[must_use]
    pub fn keyless(alg: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            key: None,
        }
    }

    /// The unsecured `none` binding
    #[must_use]
    pub fn unsecured() -> Self {
        Self::keyless(NONE)
    }

    /// Algorithm identifier
    #[must_use]
    pub fn alg(&self) -> &str {
        &self.alg
    }

    /// Bound key
    #[must_use]
    pub fn key(&self) -> Option<&Arc<Key>> {
        self.key.as_ref()
    }
}

/// Key-management and content-encryption algorithms paired with the
/// recipient key
#[derive(Debug, Clone)]
pub struct EncrypterBinding {
    alg: String,
    enc: String,
    key: Arc<Key>,
}

impl EncrypterBinding {
    /// Encrypt with `enc`, managing the CEK with `alg` and `key`
    #[must_use]
    pub fn new(alg: impl Into<String>, enc: impl Into<String>, key: Arc<Key>) -> Self {
        Self {
            alg: alg.into(),
            enc: enc.into(),
            key,
        }
    }

    /// Key-management algorithm
    #[must_use]
    pub fn alg(&self) -> &str {
        &self.alg
    }

    /// Content-encryption algorithm
    #[must_use]
    pub fn enc(&self) -> &str {
        &self.enc
    }

    /// Recipient key
    #[must_use]
    pub fn key(&self) -> &Arc<Key> {
        &self.key
    }
}

/// What a builder produces
#[derive(Debug, Clone)]
pub enum Binding {
    /// Compact JWS
    Sign(SignerBinding),
    /// Compact JWE
    Encrypt(EncrypterBinding),
}

impl From<SignerBinding> for Binding {
    fn from(binding: SignerBinding) -> Self {
        Binding::Sign(binding)
    }
}

impl From<EncrypterBinding> for Binding {
    fn from(binding: EncrypterBinding) -> Self {
        Binding::Encrypt(binding)
    }
}

/// Builds compact tokens
///
/// Configuration is fixed before building; the same builder can be shared
/// and used concurrently.
#[derive(Clone)]
pub struct TokenBuilder {
    registry: Arc<AlgorithmRegistry>,
    clock: Arc<dyn Clock>,
    binding: Option<Binding>,
    typ: Option<String>,
    cty: Option<String>,
    jku: Option<String>,
    extra: BTreeMap<String, Value>,
    crit: Option<Vec<String>>,
    compress: bool,
}

impl Default for TokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBuilder")
            .field("binding", &self.binding)
            .field("typ", &self.typ)
            .field("compress", &self.compress)
            .finish_non_exhaustive()
    }
}

impl TokenBuilder {
    /// Builder over the standard registry and the system clock, `typ=JWT`
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: AlgorithmRegistry::standard(),
            clock: Arc::new(SystemClock),
            binding: None,
            typ: Some("JWT".to_string()),
            cty: None,
            jku: None,
            extra: BTreeMap::new(),
            crit: None,
            compress: false,
        }
    }

    /// Use another registry
    #[must_use]
    pub fn registry(mut self, registry: Arc<AlgorithmRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use another time source
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bind a signer or encrypter
    #[must_use]
    pub fn bind(mut self, binding: impl Into<Binding>) -> Self {
        self.binding = Some(binding.into());
        self
    }

    /// Set `typ`, or leave it out with `None`
    #[must_use]
    pub fn typ(mut self, typ: Option<&str>) -> Self {
        self.typ = typ.map(str::to_string);
        self
    }

    /// Set `cty`
    #[must_use]
    pub fn content_type(mut self, cty: impl Into<String>) -> Self {
        self.cty = Some(cty.into());
        self
    }

    /// Set `jku`
    #[must_use]
    pub fn jwk_set_url(mut self, jku: impl Into<String>) -> Self {
        self.jku = Some(jku.into());
        self
    }

    /// Add an extension header parameter
    #[must_use]
    pub fn header_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Add an extension header parameter and mark it critical
    #[must_use]
    pub fn critical_header_param(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let mut next = self.header_param(name.clone(), value);
        next.crit.get_or_insert_with(Vec::new).push(name);
        next
    }

    /// DEFLATE the payload before encryption (`zip=DEF`, JWE only)
    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Build a token from `claims` under `policy`
    pub fn build(&self, claims: &ClaimOptions, policy: &SecurityPolicy) -> BuildOutcome {
        let mut errors = Vec::new();

        match &self.binding {
            None => errors.push(JoseError::MissingSigner),
            Some(binding) => self.check_binding(binding, policy, &mut errors),
        }
        if self.compress && !matches!(self.binding, Some(Binding::Encrypt(_))) {
            errors.push(JoseError::structural("zip applies to JWE only"));
        }
        for name in self.extra.keys() {
            if REGISTERED_HEADER_PARAMS.contains(&name.as_str()) {
                errors.push(JoseError::structural(format!(
                    "'{name}' is a registered header parameter"
                )));
            }
        }

        let claims = match claims.resolve(self.clock.now()) {
            Ok(claims) => Some(claims),
            Err(claim_errors) => {
                errors.extend(claim_errors);
                None
            }
        };

        let (Some(binding), Some(claims), true) = (&self.binding, claims, errors.is_empty()) else {
            tracing::debug!(error_count = errors.len(), "token build rejected");
            return Outcome::failure(errors);
        };

        let serialized = match binding {
            Binding::Sign(signer) => self.serialize_jws(signer, &claims),
            Binding::Encrypt(encrypter) => self.serialize_jwe(encrypter, &claims),
        };
        match serialized {
            Ok(token) => {
                tracing::trace!(len = token.len(), "token built");
                Outcome::success(token)
            }
            Err(e) => {
                tracing::debug!(kind = %e.kind(), "token build failed");
                Outcome::failure(vec![e])
            }
        }
    }

    fn check_binding(&self, binding: &Binding, policy: &SecurityPolicy, errors: &mut Vec<JoseError>) {
        match binding {
            Binding::Sign(signer) => {
                let algorithm = match self.registry.signer(&signer.alg) {
                    Ok(capability) => Some(capability.algorithm()),
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                };
                if signer.alg == NONE {
                    if !policy.allows_none() {
                        tracing::warn!("refusing to build an unsecured token");
                        errors.push(JoseError::policy_violation("alg 'none' is not allowed"));
                    }
                    return;
                }
                if !policy.permits(&signer.alg) {
                    errors.push(not_permitted(&signer.alg));
                }
                match (&signer.key, algorithm) {
                    (None, _) => errors.push(JoseError::MissingSigner),
                    (Some(key), Some(algorithm)) => {
                        if let Err(e) = algorithm.check_key(key, KeyOperation::Sign) {
                            errors.push(e);
                        }
                    }
                    (Some(_), None) => {}
                }
            }
            Binding::Encrypt(encrypter) => {
                let wrapper = self.registry.key_wrapper(&encrypter.alg);
                let cipher = self.registry.content_cipher(&encrypter.enc);
                match (wrapper, cipher) {
                    (Ok(wrapper), Ok(cipher)) => {
                        if let Err(e) = wrapper.check_key(cipher.key_len(), &encrypter.key) {
                            errors.push(e);
                        }
                    }
                    (wrapper, cipher) => {
                        errors.extend(wrapper.err());
                        errors.extend(cipher.err());
                    }
                }
                for id in [&encrypter.alg, &encrypter.enc] {
                    if !policy.permits(id) {
                        errors.push(not_permitted(id));
                    }
                }
            }
        }
    }

    fn header(&self, alg: &str, key: Option<&Key>) -> Header {
        Header {
            alg: alg.to_string(),
            typ: self.typ.clone(),
            cty: self.cty.clone(),
            kid: key.and_then(Key::kid).map(str::to_string),
            jku: self.jku.clone(),
            crit: self.crit.clone(),
            extra: self.extra.clone(),
            ..Header::default()
        }
    }

    fn serialize_jws(&self, binding: &SignerBinding, claims: &ClaimSet) -> JoseResult<String> {
        let key = binding.key.as_deref();
        let header = self.header(&binding.alg, key);
        let signing_input = format!(
            "{}.{}",
            base64_url_encode(serde_json::to_vec(&header)?),
            base64_url_encode(serde_json::to_vec(&claims.to_json_map())?)
        );
        let signature = self
            .registry
            .signer(&binding.alg)?
            .sign(signing_input.as_bytes(), key)?;
        Ok(format!("{signing_input}.{}", base64_url_encode(signature)))
    }

    fn serialize_jwe(&self, binding: &EncrypterBinding, claims: &ClaimSet) -> JoseResult<String> {
        let wrapper = self.registry.key_wrapper(&binding.alg)?;
        let cipher = self.registry.content_cipher(&binding.enc)?;

        let mut header = self.header(&binding.alg, Some(binding.key.as_ref()));
        header.enc = Some(binding.enc.clone());
        if self.compress {
            header.zip = Some(zip::DEFLATE.to_string());
        }
        let protected = base64_url_encode(serde_json::to_vec(&header)?);

        let mut plaintext = serde_json::to_vec(&claims.to_json_map())?;
        if self.compress {
            plaintext = zip::deflate(&plaintext)?;
        }

        let wrapped = wrapper.wrap(cipher.key_len(), &binding.key)?;
        let iv = random_bytes(cipher.iv_len());
        let sealed = cipher.encrypt(&wrapped.cek, &iv, protected.as_bytes(), &plaintext)?;

        Ok([
            protected,
            base64_url_encode(&wrapped.encrypted_key),
            base64_url_encode(iv.as_slice()),
            base64_url_encode(&sealed.ciphertext),
            base64_url_encode(&sealed.tag),
        ]
        .join("."))
    }
}

fn not_permitted(alg: &str) -> JoseError {
    JoseError::policy_violation(format!("algorithm '{alg}' is not permitted"))
}

/// Build a token with the standard registry and the system clock
pub fn build(
    binding: impl Into<Binding>,
    claims: &ClaimOptions,
    policy: &SecurityPolicy,
) -> BuildOutcome {
    TokenBuilder::new().bind(binding).build(claims, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn hmac_key() -> Arc<Key> {
        Arc::new(Key::symmetric(b"secret".to_vec()).kid("key_id").build().unwrap())
    }

    #[test]
    fn jws_has_three_segments_and_kid() {
        let token = TokenBuilder::new()
            .clock(Arc::new(FixedClock::at_timestamp(1_000)))
            .bind(SignerBinding::new("HS256", hmac_key()))
            .build(&ClaimOptions::new().jti("10").without_nonce(), &SecurityPolicy::default())
            .into_result()
            .unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        let header: Header =
            serde_json::from_slice(&crate::encoding::base64_url_decode(segments[0]).unwrap())
                .unwrap();
        assert_eq!(header.kid.as_deref(), Some("key_id"));
        assert_eq!(header.typ.as_deref(), Some("JWT"));
        assert_eq!(
            crate::encoding::base64_url_decode(segments[1]).unwrap(),
            br#"{"iat":1000,"jti":"10"}"#
        );
    }

    #[test]
    fn no_binding_is_missing_signer() {
        let outcome = TokenBuilder::new().build(&ClaimOptions::new(), &SecurityPolicy::default());
        assert_eq!(outcome.errors(), &[JoseError::MissingSigner]);
        assert!(outcome.value().is_none());
    }

    #[test]
    fn keyless_signer_is_missing_signer() {
        let outcome = build(
            SignerBinding::keyless("HS256"),
            &ClaimOptions::new(),
            &SecurityPolicy::default(),
        );
        assert_eq!(outcome.errors(), &[JoseError::MissingSigner]);
    }

    #[test]
    fn errors_are_aggregated() {
        let policy = SecurityPolicy::default().with_algorithm_removed("HS256");
        let claims = ClaimOptions::new().subject("").custom("iat", 1);
        let rsa_alg = SignerBinding::new("RS256", hmac_key());
        let outcome = build(rsa_alg, &claims, &policy);
        let kinds: Vec<_> = outcome.errors().iter().map(JoseError::kind).collect();
        assert_eq!(outcome.errors().len(), 3, "{:?}", outcome.errors());
        assert!(kinds.contains(&crate::ErrorKind::KeyMismatch));
        assert!(kinds.contains(&crate::ErrorKind::InvalidClaim));

        let outcome = build(SignerBinding::new("HS256", hmac_key()), &claims, &policy);
        assert!(outcome
            .errors()
            .iter()
            .any(|e| matches!(e, JoseError::PolicyViolation(_))));
        assert!(outcome.value().is_none());
    }

    #[test]
    fn none_requires_policy_consent() {
        let claims = ClaimOptions::new();
        let refused = build(SignerBinding::unsecured(), &claims, &SecurityPolicy::default());
        assert!(matches!(refused.errors(), [JoseError::PolicyViolation(_)]));

        let policy = SecurityPolicy::default().with_allow_none(true);
        let token = build(SignerBinding::unsecured(), &claims, &policy)
            .into_result()
            .unwrap();
        assert!(token.ends_with('.'));
    }

    #[test]
    fn unknown_algorithm_is_unsupported() {
        let outcome = build(
            SignerBinding::new("HS999", hmac_key()),
            &ClaimOptions::new(),
            &SecurityPolicy::default().with_algorithm_added("HS999"),
        );
        assert_eq!(
            outcome.errors(),
            &[JoseError::UnsupportedAlgorithm("HS999".into())]
        );
    }

    #[test]
    fn compression_rejected_for_jws() {
        let outcome = TokenBuilder::new()
            .bind(SignerBinding::new("HS256", hmac_key()))
            .compress(true)
            .build(&ClaimOptions::new(), &SecurityPolicy::default());
        assert!(matches!(outcome.errors(), [JoseError::Structural(_)]));
    }

    #[test]
    fn extension_params_cannot_shadow_registered_ones() {
        let outcome = TokenBuilder::new()
            .bind(SignerBinding::new("HS256", hmac_key()))
            .header_param("alg", "none")
            .build(&ClaimOptions::new(), &SecurityPolicy::default());
        assert!(outcome.value().is_none());
        assert!(matches!(outcome.errors(), [JoseError::Structural(_)]));
    }

    #[test]
    fn encryption_key_size_is_reported_with_claim_errors() {
        let cases = [
            ("A128KW", "A128GCM", vec![0x42; 32]),
            ("dir", "A256GCM", vec![0x42; 16]),
        ];
        for (alg, enc, secret) in cases {
            let key = Arc::new(Key::symmetric(secret).build().unwrap());
            let outcome = TokenBuilder::new()
                .bind(EncrypterBinding::new(alg, enc, key))
                .build(&ClaimOptions::new().jti(""), &SecurityPolicy::default());
            assert!(outcome.value().is_none());
            let kinds: Vec<_> = outcome.errors().iter().map(JoseError::kind).collect();
            assert_eq!(kinds.len(), 2, "{alg}/{enc}: {:?}", outcome.errors());
            assert!(kinds.contains(&crate::ErrorKind::KeyMismatch));
            assert!(kinds.contains(&crate::ErrorKind::InvalidClaim));
        }
    }
}
