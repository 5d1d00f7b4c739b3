//! Shared fixtures for the integration tests
#![allow(dead_code)]

use cryypt_jose::keys::{EcPrivateKey, KeyMaterial};
use cryypt_jose::{FixedClock, Key};
use once_cell::sync::Lazy;
use std::sync::{Arc, Once};

/// 2023-11-14T22:13:20Z
pub const NOW: i64 = 1_700_000_000;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at_timestamp(NOW))
}

static RSA_PRIVATE: Lazy<rsa::RsaPrivateKey> = Lazy::new(|| {
    rsa::RsaPrivateKey::new(&mut rsa::rand_core::OsRng, 2048).expect("rsa keygen")
});

pub fn rsa_private(kid: &str) -> Arc<Key> {
    let material = KeyMaterial::RsaPrivate(Box::new(RSA_PRIVATE.clone()));
    Arc::new(Key::builder(material).kid(kid).build().unwrap())
}

pub fn rsa_public(kid: &str) -> Arc<Key> {
    Arc::new(rsa_private(kid).to_public().unwrap())
}

pub fn p256_private(kid: &str) -> Arc<Key> {
    let signing = p256::ecdsa::SigningKey::from_slice(&[0x42; 32]).unwrap();
    let material = KeyMaterial::EcPrivate(EcPrivateKey::P256(signing));
    Arc::new(Key::builder(material).kid(kid).build().unwrap())
}

pub fn p384_private(kid: &str) -> Arc<Key> {
    let signing = p384::ecdsa::SigningKey::from_slice(&[0x24; 48]).unwrap();
    let material = KeyMaterial::EcPrivate(EcPrivateKey::P384(signing));
    Arc::new(Key::builder(material).kid(kid).build().unwrap())
}

pub fn octet(kid: &str, secret: &[u8]) -> Arc<Key> {
    Arc::new(Key::symmetric(secret.to_vec()).kid(kid).build().unwrap())
}
