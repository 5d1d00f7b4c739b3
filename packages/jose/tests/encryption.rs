//! JWE building and decoding

mod common;

use common::*;
use cryypt_jose::{
    AlgorithmBinding, ClaimOptions, EncrypterBinding, ErrorKind, Integrity, Key, SecurityPolicy,
    TokenBuilder, TokenDecoder,
};
use std::sync::Arc;

fn claims() -> ClaimOptions {
    ClaimOptions::new()
        .subject("alice")
        .expires_at(NOW + 60)
        .custom("scope", "read write")
}

fn encrypt(alg: &str, enc: &str, key: Arc<Key>, compress: bool) -> String {
    TokenBuilder::new()
        .clock(clock())
        .bind(EncrypterBinding::new(alg, enc, key))
        .compress(compress)
        .build(&claims(), &SecurityPolicy::default())
        .into_result()
        .unwrap_or_else(|errors| panic!("{alg}/{enc}: build failed: {errors:?}"))
}

fn decrypt(token: &str, alg: &str, enc: &str, key: &Arc<Key>) -> cryypt_jose::DecodeOutcome {
    TokenDecoder::new().clock(clock()).decode(
        token,
        &AlgorithmBinding::encryption(alg, enc),
        key,
        &SecurityPolicy::default(),
    )
}

fn key_for(alg: &str, enc: &str) -> (Arc<Key>, Arc<Key>) {
    let cek_len = if enc == "A128GCM" { 16 } else { 32 };
    match alg {
        "dir" => {
            let key = octet("k", &vec![0x11; cek_len]);
            (Arc::clone(&key), key)
        }
        "A128KW" => {
            let key = octet("k", &[0x22; 16]);
            (Arc::clone(&key), key)
        }
        "A256KW" => {
            let key = octet("k", &[0x33; 32]);
            (Arc::clone(&key), key)
        }
        "RSA-OAEP-256" => (rsa_public("k"), rsa_private("k")),
        other => panic!("no fixture for {other}"),
    }
}

#[test]
fn every_key_management_and_content_pairing() {
    init_tracing();
    for alg in ["dir", "A128KW", "A256KW", "RSA-OAEP-256"] {
        for enc in ["A128GCM", "A256GCM"] {
            let (encrypting, decrypting) = key_for(alg, enc);
            let token = encrypt(alg, enc, encrypting, false);
            let segments: Vec<&str> = token.split('.').collect();
            assert_eq!(segments.len(), 5, "{alg}/{enc}");
            if alg == "dir" {
                assert!(segments[1].is_empty());
            } else {
                assert!(!segments[1].is_empty());
            }

            let decoded = decrypt(&token, alg, enc, &decrypting)
                .into_result()
                .unwrap_or_else(|errors| panic!("{alg}/{enc}: decode failed: {errors:?}"));
            assert_eq!(decoded.header().enc.as_deref(), Some(enc));
            assert_eq!(decoded.claims().sub.as_deref(), Some("alice"));
            assert!(matches!(decoded.integrity(), Integrity::Encryption { .. }));
        }
    }
}

#[test]
fn compressed_payload_round_trips() {
    init_tracing();
    let key = octet("k", &[0x44; 32]);
    let token = encrypt("A256KW", "A256GCM", Arc::clone(&key), true);
    let decoded = decrypt(&token, "A256KW", "A256GCM", &key).into_result().unwrap();
    assert_eq!(decoded.header().zip.as_deref(), Some("DEF"));
    assert_eq!(
        decoded.claims().get("scope"),
        Some(&serde_json::json!("read write"))
    );
}

#[test]
fn inflate_limit_rejects_oversized_payloads() {
    let key = octet("k", &[0x44; 32]);
    let token = encrypt("dir", "A256GCM", Arc::clone(&key), true);
    let outcome = TokenDecoder::new()
        .clock(clock())
        .max_decompressed_len(16)
        .decode(
            &token,
            &AlgorithmBinding::encryption("dir", "A256GCM"),
            &key,
            &SecurityPolicy::default(),
        );
    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].kind(), ErrorKind::Structural);
}

#[test]
fn tampered_ciphertext_fails_authentication() {
    let key = octet("k", &[0x55; 16]);
    let token = encrypt("A128KW", "A128GCM", Arc::clone(&key), false);
    let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();
    let flipped = if segments[3].starts_with('A') { "B" } else { "A" };
    segments[3].replace_range(0..1, flipped);
    let outcome = decrypt(&segments.join("."), "A128KW", "A128GCM", &key);
    assert!(outcome.value().is_none());
    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].kind(), ErrorKind::Signature);
}

#[test]
fn wrong_key_encryption_key_fails() {
    let token = encrypt("A256KW", "A128GCM", octet("k", &[0x66; 32]), false);
    let outcome = decrypt(&token, "A256KW", "A128GCM", &octet("k", &[0x67; 32]));
    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].kind(), ErrorKind::Signature);
}

#[test]
fn rsa_oaep_with_other_private_key_fails_without_leaking_why() {
    let token = encrypt("RSA-OAEP-256", "A256GCM", rsa_public("k"), false);
    let other = rsa::RsaPrivateKey::new(&mut rsa::rand_core::OsRng, 2048).unwrap();
    let other = Arc::new(
        Key::builder(cryypt_jose::KeyMaterial::RsaPrivate(Box::new(other)))
            .kid("k")
            .build()
            .unwrap(),
    );
    let outcome = decrypt(&token, "RSA-OAEP-256", "A256GCM", &other);
    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].kind(), ErrorKind::Signature);
}

#[test]
fn expected_enc_must_match_header() {
    let key = octet("k", &[0x77; 32]);
    let token = encrypt("A256KW", "A256GCM", Arc::clone(&key), false);
    let outcome = decrypt(&token, "A256KW", "A128GCM", &key);
    assert_eq!(outcome.errors()[0].kind(), ErrorKind::PolicyViolation);
}

#[test]
fn direct_key_length_must_match_content_cipher() {
    let outcome = TokenBuilder::new()
        .bind(EncrypterBinding::new("dir", "A256GCM", octet("k", &[1; 16])))
        .build(&claims(), &SecurityPolicy::default());
    assert!(outcome.value().is_none());
    assert!(!outcome.errors().is_empty());
}
