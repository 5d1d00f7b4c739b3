//! Token decoding pipeline
//!
//! Stages run in order: structural parse, header decode, algorithm check,
//! key resolution, signature verification, claim validation. The first five
//! stop at their first error because nothing after them can be trusted;
//! claim validation always runs to completion and reports every violation.

use crate::{
    algorithms::{AlgorithmRegistry, NONE},
    builder::{EncrypterBinding, SignerBinding},
    claims::{validate_claims, ClaimSet},
    clock::{Clock, SystemClock},
    encoding::base64_url_decode,
    error::{JoseError, JoseResult},
    keys::{Key, KeyResolver, KeyType},
    outcome::{DecodeOutcome, Outcome},
    policy::SecurityPolicy,
    types::{Header, Integrity, Token, REGISTERED_HEADER_PARAMS},
    zip,
};
use serde_json::Value;
use std::{fmt, sync::Arc};

/// Longest compact token accepted by default
pub const DEFAULT_MAX_TOKEN_LEN: usize = 64 * 1024;

/// Largest inflated `zip=DEF` payload accepted by default
pub const DEFAULT_MAX_DECOMPRESSED_LEN: usize = 256 * 1024;

const JWS_SEGMENTS: usize = 3;
const JWE_SEGMENTS: usize = 5;

/// The algorithm(s) the caller expects a token to use
///
/// The header never chooses the verification algorithm; it must match this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlgorithmBinding {
    /// A JWS signed with `alg`
    Signature {
        /// Signature algorithm
        alg: String,
    },
    /// A JWE using `alg` for key management and `enc` for content
    Encryption {
        /// Key-management algorithm
        alg: String,
        /// Content-encryption algorithm
        enc: String,
    },
}

impl AlgorithmBinding {
    /// Expect a JWS signed with `alg`
    #[must_use]
    pub fn signature(alg: impl Into<String>) -> Self {
        AlgorithmBinding::Signature { alg: alg.into() }
    }

    /// Expect a JWE with `alg` and `enc`
    #[must_use]
    pub fn encryption(alg: impl Into<String>, enc: impl Into<String>) -> Self {
        AlgorithmBinding::Encryption {
            alg: alg.into(),
            enc: enc.into(),
        }
    }

    /// Expect an unsecured JWS
    #[must_use]
    pub fn unsecured() -> Self {
        Self::signature(NONE)
    }
}

impl From<&SignerBinding> for AlgorithmBinding {
    fn from(binding: &SignerBinding) -> Self {
        Self::signature(binding.alg())
    }
}

impl From<&EncrypterBinding> for AlgorithmBinding {
    fn from(binding: &EncrypterBinding) -> Self {
        Self::encryption(binding.alg(), binding.enc())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    StructuralParse,
    HeaderDecode,
    AlgorithmCheck,
    KeyResolution,
    SignatureVerification,
    ClaimValidation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

type Halt = (Stage, JoseError);

fn at(stage: Stage) -> impl Fn(JoseError) -> Halt {
    move |error| (stage, error)
}

/// Integrity-checked header and payload, ready for claim validation
struct Verified {
    header: Header,
    payload: Vec<u8>,
    integrity: Integrity,
}

/// Decodes and verifies compact tokens
#[derive(Clone)]
pub struct TokenDecoder {
    registry: Arc<AlgorithmRegistry>,
    clock: Arc<dyn Clock>,
    max_token_len: usize,
    max_decompressed_len: usize,
}

impl Default for TokenDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenDecoder")
            .field("max_token_len", &self.max_token_len)
            .field("max_decompressed_len", &self.max_decompressed_len)
            .finish_non_exhaustive()
    }
}

impl TokenDecoder {
    /// Decoder over the standard registry and the system clock
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: AlgorithmRegistry::standard(),
            clock: Arc::new(SystemClock),
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            max_decompressed_len: DEFAULT_MAX_DECOMPRESSED_LEN,
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

    /// Reject tokens longer than `len` bytes
    #[must_use]
    pub fn max_token_len(mut self, len: usize) -> Self {
        self.max_token_len = len;
        self
    }

    /// Reject `zip=DEF` payloads that inflate beyond `len` bytes
    #[must_use]
    pub fn max_decompressed_len(mut self, len: usize) -> Self {
        self.max_decompressed_len = len;
        self
    }

    /// Run the pipeline over `token`
    pub fn decode<R>(
        &self,
        token: &str,
        expected: &AlgorithmBinding,
        resolver: &R,
        policy: &SecurityPolicy,
    ) -> DecodeOutcome
    where
        R: KeyResolver + ?Sized,
    {
        let verified = match self.verify(token, expected, resolver, policy) {
            Ok(verified) => verified,
            Err((stage, error)) => {
                tracing::debug!(%stage, kind = %error.kind(), "token decode halted");
                return Outcome::failure(vec![error]);
            }
        };

        let map = match serde_json::from_slice::<Value>(&verified.payload) {
            Ok(Value::Object(map)) => map,
            _ => {
                tracing::debug!(stage = %Stage::ClaimValidation, "payload is not a claim set");
                return Outcome::failure(vec![JoseError::structural(
                    "payload is not a JSON object",
                )]);
            }
        };
        let (claims, violations) = ClaimSet::from_json_map(map);
        let mut errors: Vec<JoseError> = violations.into_iter().map(JoseError::from).collect();
        errors.extend(validate_claims(&claims, self.clock.now(), policy));

        let token = Token::new(verified.header, claims, verified.integrity, token.to_string());
        if errors.is_empty() {
            tracing::trace!(alg = %token.header().alg, "token decoded");
            Outcome::success(token)
        } else {
            tracing::debug!(
                stage = %Stage::ClaimValidation,
                error_count = errors.len(),
                "token claims rejected"
            );
            Outcome::rejected(token, errors)
        }
    }

    fn verify<R>(
        &self,
        token: &str,
        expected: &AlgorithmBinding,
        resolver: &R,
        policy: &SecurityPolicy,
    ) -> Result<Verified, Halt>
    where
        R: KeyResolver + ?Sized,
    {
        let segments = self.split(token).map_err(at(Stage::StructuralParse))?;
        let header =
            decode_header(segments[0], segments.len(), policy).map_err(at(Stage::HeaderDecode))?;
        check_algorithm(&header, segments.len(), expected, policy)
            .map_err(at(Stage::AlgorithmCheck))?;

        if segments.len() == JWS_SEGMENTS {
            self.verify_jws(token, &segments, header, resolver)
        } else {
            self.verify_jwe(&segments, header, resolver)
        }
    }

    fn split<'t>(&self, token: &'t str) -> JoseResult<Vec<&'t str>> {
        if token.len() > self.max_token_len {
            return Err(JoseError::structural(format!(
                "token exceeds {} bytes",
                self.max_token_len
            )));
        }
        let segments: Vec<&str> = token.split('.').collect();
        match segments.len() {
            JWS_SEGMENTS | JWE_SEGMENTS => Ok(segments),
            n => Err(JoseError::structural(format!(
                "expected {JWS_SEGMENTS} or {JWE_SEGMENTS} segments, found {n}"
            ))),
        }
    }

    fn verify_jws<R>(
        &self,
        token: &str,
        segments: &[&str],
        header: Header,
        resolver: &R,
    ) -> Result<Verified, Halt>
    where
        R: KeyResolver + ?Sized,
    {
        let verifier = self
            .registry
            .verifier(&header.alg)
            .map_err(at(Stage::AlgorithmCheck))?;
        let key = resolve_key(resolver, &header, verifier.algorithm().key_type())
            .map_err(at(Stage::KeyResolution))?;

        let signature =
            decode_segment(segments[2], "signature").map_err(at(Stage::SignatureVerification))?;
        let signing_input = &token[..segments[0].len() + 1 + segments[1].len()];
        match verifier.verify(signing_input.as_bytes(), &signature, key.as_deref()) {
            Ok(true) => {}
            Ok(false) => return Err((Stage::SignatureVerification, JoseError::Signature)),
            Err(e) => return Err((Stage::SignatureVerification, e)),
        }

        let payload =
            decode_segment(segments[1], "payload").map_err(at(Stage::SignatureVerification))?;
        Ok(Verified {
            header,
            payload,
            integrity: Integrity::Signature(signature),
        })
    }

    fn verify_jwe<R>(
        &self,
        segments: &[&str],
        header: Header,
        resolver: &R,
    ) -> Result<Verified, Halt>
    where
        R: KeyResolver + ?Sized,
    {
        let enc = header.enc.as_deref().unwrap_or_default();
        let wrapper = self
            .registry
            .key_wrapper(&header.alg)
            .map_err(at(Stage::AlgorithmCheck))?;
        let cipher = self
            .registry
            .content_cipher(enc)
            .map_err(at(Stage::AlgorithmCheck))?;

        let key = resolve_key(resolver, &header, wrapper.algorithm().key_type())
            .and_then(|key| {
                key.ok_or_else(|| JoseError::key_resolution("key management needs a key"))
            })
            .map_err(at(Stage::KeyResolution))?;

        let stage5 = at(Stage::SignatureVerification);
        let encrypted_key = decode_segment(segments[1], "encrypted key").map_err(&stage5)?;
        let iv = decode_segment(segments[2], "iv").map_err(&stage5)?;
        let ciphertext = decode_segment(segments[3], "ciphertext").map_err(&stage5)?;
        let tag = decode_segment(segments[4], "tag").map_err(&stage5)?;

        let cek = wrapper
            .unwrap(&encrypted_key, cipher.key_len(), &key)
            .map_err(&stage5)?;
        let plaintext = cipher
            .decrypt(&cek, &iv, segments[0].as_bytes(), &ciphertext, &tag)
            .map_err(&stage5)?;
        let payload = match header.zip.as_deref() {
            Some(_) => zip::inflate(&plaintext, self.max_decompressed_len).map_err(&stage5)?,
            None => plaintext,
        };

        Ok(Verified {
            header,
            payload,
            integrity: Integrity::Encryption {
                encrypted_key,
                iv,
                tag,
            },
        })
    }
}

fn decode_segment(segment: &str, name: &str) -> JoseResult<Vec<u8>> {
    base64_url_decode(segment)
        .map_err(|_| JoseError::structural(format!("{name} is not valid base64url")))
}

fn decode_header(segment: &str, segment_count: usize, policy: &SecurityPolicy) -> JoseResult<Header> {
    let bytes = decode_segment(segment, "header")?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|_| JoseError::structural("header is not valid JSON"))?;
    if !value.is_object() {
        return Err(JoseError::structural("header is not a JSON object"));
    }
    let header: Header = serde_json::from_value(value)
        .map_err(|e| JoseError::structural(format!("invalid header: {e}")))?;

    check_critical(&header, policy)?;

    if segment_count == JWE_SEGMENTS {
        if header.enc.is_none() {
            return Err(JoseError::structural("JWE header requires 'enc'"));
        }
        if let Some(zip) = header.zip.as_deref() {
            if zip != zip::DEFLATE {
                return Err(JoseError::structural(format!("unsupported zip '{zip}'")));
            }
        }
    } else if header.enc.is_some() || header.zip.is_some() {
        return Err(JoseError::structural("'enc' and 'zip' are JWE parameters"));
    }
    Ok(header)
}

fn check_critical(header: &Header, policy: &SecurityPolicy) -> JoseResult<()> {
    let Some(crit) = &header.crit else {
        return Ok(());
    };
    if crit.is_empty() {
        return Err(JoseError::structural("'crit' must not be empty"));
    }
    for name in crit {
        if REGISTERED_HEADER_PARAMS.contains(&name.as_str()) {
            return Err(JoseError::structural(format!(
                "'crit' lists registered parameter '{name}'"
            )));
        }
        if !header.extra.contains_key(name) {
            return Err(JoseError::structural(format!(
                "critical parameter '{name}' is missing"
            )));
        }
        if !policy.understands_extension(name) {
            return Err(JoseError::structural(format!(
                "unsupported critical extension '{name}'"
            )));
        }
    }
    Ok(())
}

fn check_algorithm(
    header: &Header,
    segment_count: usize,
    expected: &AlgorithmBinding,
    policy: &SecurityPolicy,
) -> JoseResult<()> {
    match expected {
        AlgorithmBinding::Signature { alg } => {
            if segment_count != JWS_SEGMENTS {
                return Err(JoseError::policy_violation("expected a JWS, got a JWE"));
            }
            expect_equal("alg", &header.alg, alg)?;
        }
        AlgorithmBinding::Encryption { alg, enc } => {
            if segment_count != JWE_SEGMENTS {
                return Err(JoseError::policy_violation("expected a JWE, got a JWS"));
            }
            expect_equal("alg", &header.alg, alg)?;
            expect_equal("enc", header.enc.as_deref().unwrap_or_default(), enc)?;
        }
    }

    if header.alg == NONE && !policy.allows_none() {
        tracing::warn!("rejected unsecured token");
        return Err(JoseError::policy_violation("alg 'none' is not allowed"));
    }
    for id in std::iter::once(header.alg.as_str()).chain(header.enc.as_deref()) {
        if !policy.permits(id) {
            return Err(JoseError::policy_violation(format!(
                "algorithm '{id}' is not permitted"
            )));
        }
    }
    Ok(())
}

fn expect_equal(param: &str, actual: &str, expected: &str) -> JoseResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(JoseError::policy_violation(format!(
            "token {param} '{actual}' does not match expected '{expected}'"
        )))
    }
}

fn resolve_key<R>(
    resolver: &R,
    header: &Header,
    key_type: Option<KeyType>,
) -> JoseResult<Option<Arc<Key>>>
where
    R: KeyResolver + ?Sized,
{
    let Some(key_type) = key_type else {
        return Ok(None);
    };
    match resolver.resolve(header.kid.as_deref(), key_type) {
        Ok(key) => Ok(Some(key)),
        Err(e @ JoseError::KeyResolution(_)) => Err(e),
        Err(other) => Err(JoseError::key_resolution(other.to_string())),
    }
}

/// Decode with the standard registry and the system clock
pub fn decode<R>(
    token: &str,
    expected: &AlgorithmBinding,
    resolver: &R,
    policy: &SecurityPolicy,
) -> DecodeOutcome
where
    R: KeyResolver + ?Sized,
{
    TokenDecoder::new().decode(token, expected, resolver, policy)
}
