//! `zip=DEF` payload compression (raw DEFLATE, RFC 1951)

use crate::error::{JoseError, JoseResult};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use std::io::{Read, Write};

/// The only `zip` value understood
pub(crate) const DEFLATE: &str = "DEF";

pub(crate) fn deflate(data: &[u8]) -> JoseResult<Vec<u8>> {
    (|| {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        encoder.finish()
    })()
    .map_err(|e: std::io::Error| JoseError::Crypto(format!("DEFLATE failed: {e}")))
}

/// Inflate at most `limit` bytes; anything larger is rejected
pub(crate) fn inflate(data: &[u8], limit: usize) -> JoseResult<Vec<u8>> {
    let mut output = Vec::new();
    DeflateDecoder::new(data)
        .take(limit as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|_| JoseError::structural("payload is not valid DEFLATE data"))?;
    if output.len() > limit {
        return Err(JoseError::structural(format!(
            "decompressed payload exceeds {limit} bytes"
        )));
    }
    Ok(output)
}
