//! Base64url helpers shared by the codec and the key model (RFC 7515 §2)

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Base64 URL-safe encoding without padding
#[inline]
pub(crate) fn base64_url_encode(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Base64 URL-safe decoding without padding
///
/// Padding and the standard alphabet are both rejected.
#[inline]
pub(crate) fn base64_url_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(input)
}
