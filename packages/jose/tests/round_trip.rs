//! Build-then-decode across every signature algorithm

mod common;

use common::*;
use cryypt_jose::{
    AlgorithmBinding, ClaimOptions, Key, KeySet, SecurityPolicy, SignerBinding, TokenBuilder,
    TokenDecoder,
};
use std::sync::Arc;

fn claims() -> ClaimOptions {
    ClaimOptions::new()
        .issuer("https://issuer.example")
        .subject("user-7")
        .audience("api")
        .expires_at(NOW + 600)
        .custom("role", "admin")
}

fn round_trip(alg: &str, signing: Arc<Key>, verifying: Arc<Key>) {
    init_tracing();
    let policy = SecurityPolicy::default();
    let token = TokenBuilder::new()
        .clock(clock())
        .bind(SignerBinding::new(alg, signing))
        .build(&claims(), &policy)
        .into_result()
        .unwrap_or_else(|errors| panic!("{alg}: build failed: {errors:?}"));

    let decoded = TokenDecoder::new()
        .clock(clock())
        .decode(&token, &AlgorithmBinding::signature(alg), &verifying, &policy)
        .into_result()
        .unwrap_or_else(|errors| panic!("{alg}: decode failed: {errors:?}"));

    assert_eq!(decoded.header().alg, alg);
    assert_eq!(decoded.header().typ.as_deref(), Some("JWT"));
    assert_eq!(decoded.as_str(), token);
    let claims = decoded.claims();
    assert_eq!(claims.iss.as_deref(), Some("https://issuer.example"));
    assert_eq!(claims.sub.as_deref(), Some("user-7"));
    assert_eq!(claims.exp, Some(NOW + 600));
    assert_eq!(claims.iat, Some(NOW));
    assert!(claims.nonce.is_some());
    assert_eq!(claims.get("role"), Some(&serde_json::json!("admin")));
}

#[test]
fn hmac_family() {
    let key = octet("mac", &[0x5a; 64]);
    for alg in ["HS256", "HS384", "HS512"] {
        round_trip(alg, Arc::clone(&key), Arc::clone(&key));
    }
}

#[test]
fn rsa_family_verifies_with_public_key() {
    for alg in ["RS256", "RS384", "RS512", "PS256", "PS384", "PS512"] {
        round_trip(alg, rsa_private("rsa"), rsa_public("rsa"));
    }
}

#[test]
fn ecdsa_family_verifies_with_public_key() {
    let p256 = p256_private("ec");
    round_trip("ES256", Arc::clone(&p256), Arc::new(p256.to_public().unwrap()));
    let p384 = p384_private("ec");
    round_trip("ES384", Arc::clone(&p384), Arc::new(p384.to_public().unwrap()));
}

#[test]
fn ecdsa_curve_must_match_algorithm() {
    let policy = SecurityPolicy::default();
    let outcome = TokenBuilder::new()
        .bind(SignerBinding::new("ES384", p256_private("ec")))
        .build(&claims(), &policy);
    assert!(outcome.value().is_none());
    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].kind(), cryypt_jose::ErrorKind::KeyMismatch);
}

#[test]
fn key_set_selects_by_kid_and_type() {
    init_tracing();
    let policy = SecurityPolicy::default();
    let set = KeySet::new([
        (*octet("shared", b"0123456789abcdef")).clone(),
        rsa_public("shared").as_ref().clone(),
        p256_private("other").to_public().unwrap(),
    ])
    .unwrap();

    let token = TokenBuilder::new()
        .clock(clock())
        .bind(SignerBinding::new("RS256", rsa_private("shared")))
        .build(&claims(), &policy)
        .into_result()
        .unwrap();
    let outcome = TokenDecoder::new().clock(clock()).decode(
        &token,
        &AlgorithmBinding::signature("RS256"),
        &set,
        &policy,
    );
    assert!(outcome.is_success(), "{:?}", outcome.errors());

    let token = TokenBuilder::new()
        .clock(clock())
        .bind(SignerBinding::new("ES256", p256_private("other")))
        .build(&claims(), &policy)
        .into_result()
        .unwrap();
    let outcome = TokenDecoder::new().clock(clock()).decode(
        &token,
        &AlgorithmBinding::signature("ES256"),
        &set,
        &policy,
    );
    assert!(outcome.is_success(), "{:?}", outcome.errors());
}

#[test]
fn jwk_set_document_verifies_tokens() {
    init_tracing();
    let signing = p256_private("es-1");
    let jwk = signing.to_public_jwk().unwrap();
    let document = serde_json::json!({ "keys": [jwk] }).to_string();
    let set = KeySet::from_jwk_set_json(&document).unwrap();

    let policy = SecurityPolicy::default();
    let token = TokenBuilder::new()
        .clock(clock())
        .bind(SignerBinding::new("ES256", signing))
        .build(&claims(), &policy)
        .into_result()
        .unwrap();
    let outcome = TokenDecoder::new().clock(clock()).decode(
        &token,
        &AlgorithmBinding::signature("ES256"),
        &set,
        &policy,
    );
    assert!(outcome.is_success(), "{:?}", outcome.errors());
}

#[test]
fn unsecured_round_trip_needs_consent_on_both_sides() {
    init_tracing();
    let permissive = SecurityPolicy::default().with_allow_none(true);
    let token = TokenBuilder::new()
        .clock(clock())
        .bind(SignerBinding::unsecured())
        .build(&claims(), &permissive)
        .into_result()
        .unwrap();
    assert!(token.ends_with('.'));

    let nobody = octet("unused", b"secret");
    let decoder = TokenDecoder::new().clock(clock());
    let outcome = decoder.decode(&token, &AlgorithmBinding::unsecured(), &nobody, &permissive);
    assert!(outcome.is_success(), "{:?}", outcome.errors());

    let outcome = decoder.decode(
        &token,
        &AlgorithmBinding::unsecured(),
        &nobody,
        &SecurityPolicy::default(),
    );
    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].kind(), cryypt_jose::ErrorKind::PolicyViolation);
}
