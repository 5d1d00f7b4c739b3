//! The unsecured `none` algorithm (RFC 7518 §3.6)
//!
//! Registered like any other algorithm; whether it may be used is the
//! policy's decision, never the registry's.

use super::{Algorithm, AlgorithmFamily, Signer, Verifier, NONE};
use crate::{error::JoseResult, keys::Key};

/// Empty-signature algorithm
#[derive(Debug, Clone)]
pub struct Unsecured {
    algorithm: Algorithm,
}

impl Unsecured {
    /// The `none` algorithm
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: Algorithm::new(NONE, AlgorithmFamily::Unsecured).with_output_size(0),
        }
    }
}

impl Default for Unsecured {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer for Unsecured {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn sign(&self, _message: &[u8], _key: Option<&Key>) -> JoseResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

impl Verifier for Unsecured {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn verify(&self, _message: &[u8], signature: &[u8], _key: Option<&Key>) -> JoseResult<bool> {
        Ok(signature.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_signature_verifies() {
        let none = Unsecured::new();
        assert!(none.sign(b"msg", None).unwrap().is_empty());
        assert!(none.verify(b"msg", b"", None).unwrap());
        assert!(!none.verify(b"msg", b"x", None).unwrap());
    }
}
