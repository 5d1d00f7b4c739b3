//! JSON Web Key model (RFC 7517) and conversion into [`Key`]

use super::{
    EcCurve, EcPrivateKey, EcPublicKey, Key, KeyMaterial, KeyOperation, KeyUse,
};
use crate::{
    encoding::base64_url_decode,
    error::{JoseError, JoseResult},
};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Wire form of a single JWK
///
/// Parameters stay as strings here; [`Key::from_jwk`] does the checking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type
    pub kty: String,
    /// Key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Intended use (`sig` or `enc`)
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Permitted operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,
    /// Algorithm hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// EC curve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// EC x coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// EC or RSA private exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// RSA first prime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    /// RSA second prime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// Symmetric key value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

/// Wire form of a JWK Set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Member keys, in document order
    pub keys: Vec<Jwk>,
}

impl Key {
    /// Validate a JWK and turn it into a key
    ///
    /// # Errors
    /// - `JoseError::UnsupportedKeyType` for an unknown `kty` or curve
    /// - `JoseError::InvalidKey` for missing or malformed parameters,
    ///   unknown `use`/`key_ops` values, or inconsistent usage metadata
    pub fn from_jwk(jwk: &Jwk) -> JoseResult<Key> {
        let material = match jwk.kty.as_str() {
            "oct" => KeyMaterial::Octet(Zeroizing::new(decode_param(jwk.k.as_deref(), "k")?)),
            "RSA" => rsa_material(jwk)?,
            "EC" => ec_material(jwk)?,
            other => return Err(JoseError::UnsupportedKeyType(other.to_string())),
        };

        let mut builder = Key::builder(material);
        if let Some(kid) = &jwk.kid {
            builder = builder.kid(kid.clone());
        }
        if let Some(key_use) = &jwk.key_use {
            let key_use = KeyUse::from_name(key_use)
                .ok_or_else(|| JoseError::invalid_key(format!("unknown key use '{key_use}'")))?;
            builder = builder.key_use(key_use);
        }
        if let Some(ops) = &jwk.key_ops {
            let ops = ops
                .iter()
                .map(|op| {
                    KeyOperation::from_name(op).ok_or_else(|| {
                        JoseError::invalid_key(format!("unknown key operation '{op}'"))
                    })
                })
                .collect::<JoseResult<Vec<_>>>()?;
            builder = builder.key_ops(ops);
        }
        if let Some(alg) = &jwk.alg {
            builder = builder.algorithm(alg.clone());
        }
        builder.build()
    }
}

impl TryFrom<&Jwk> for Key {
    type Error = JoseError;

    fn try_from(jwk: &Jwk) -> JoseResult<Self> {
        Key::from_jwk(jwk)
    }
}

fn decode_param(value: Option<&str>, name: &str) -> JoseResult<Vec<u8>> {
    let value = value.ok_or_else(|| JoseError::invalid_key(format!("missing '{name}' parameter")))?;
    base64_url_decode(value)
        .map_err(|_| JoseError::invalid_key(format!("'{name}' is not valid base64url")))
}

fn decode_uint(value: Option<&str>, name: &str) -> JoseResult<BigUint> {
    Ok(BigUint::from_bytes_be(&decode_param(value, name)?))
}

fn rsa_material(jwk: &Jwk) -> JoseResult<KeyMaterial> {
    let n = decode_uint(jwk.n.as_deref(), "n")?;
    let e = decode_uint(jwk.e.as_deref(), "e")?;

    if jwk.d.is_none() {
        let key = RsaPublicKey::new(n, e)
            .map_err(|e| JoseError::invalid_key(format!("Invalid RSA public key: {e}")))?;
        return Ok(KeyMaterial::RsaPublic(key));
    }

    let d = decode_uint(jwk.d.as_deref(), "d")?;
    let p = decode_uint(jwk.p.as_deref(), "p")?;
    let q = decode_uint(jwk.q.as_deref(), "q")?;
    let key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
        .map_err(|e| JoseError::invalid_key(format!("Invalid RSA private key: {e}")))?;
    key.validate()
        .map_err(|e| JoseError::invalid_key(format!("Invalid RSA private key: {e}")))?;
    Ok(KeyMaterial::RsaPrivate(Box::new(key)))
}

fn ec_material(jwk: &Jwk) -> JoseResult<KeyMaterial> {
    let crv = jwk
        .crv
        .as_deref()
        .ok_or_else(|| JoseError::invalid_key("missing 'crv' parameter"))?;
    let curve =
        EcCurve::from_name(crv).ok_or_else(|| JoseError::UnsupportedKeyType(format!("EC {crv}")))?;
    let len = curve.coordinate_len();

    let x = decode_param(jwk.x.as_deref(), "x")?;
    let y = decode_param(jwk.y.as_deref(), "y")?;
    if x.len() != len || y.len() != len {
        return Err(JoseError::invalid_key(format!(
            "{crv} coordinates must be {len} bytes"
        )));
    }

    let public = match curve {
        EcCurve::P256 => {
            let point = p256::EncodedPoint::from_affine_coordinates(
                p256::FieldBytes::from_slice(&x),
                p256::FieldBytes::from_slice(&y),
                false,
            );
            p256::ecdsa::VerifyingKey::from_encoded_point(&point)
                .map(EcPublicKey::P256)
                .map_err(|_| JoseError::invalid_key("point is not on P-256"))?
        }
        EcCurve::P384 => {
            let point = p384::EncodedPoint::from_affine_coordinates(
                p384::FieldBytes::from_slice(&x),
                p384::FieldBytes::from_slice(&y),
                false,
            );
            p384::ecdsa::VerifyingKey::from_encoded_point(&point)
                .map(EcPublicKey::P384)
                .map_err(|_| JoseError::invalid_key("point is not on P-384"))?
        }
    };

    let Some(d) = jwk.d.as_deref() else {
        return Ok(KeyMaterial::EcPublic(public));
    };
    let d = Zeroizing::new(decode_param(Some(d), "d")?);
    if d.len() != len {
        return Err(JoseError::invalid_key(format!("{crv} private scalar must be {len} bytes")));
    }
    let private = match curve {
        EcCurve::P256 => p256::ecdsa::SigningKey::from_slice(&d)
            .map(EcPrivateKey::P256)
            .map_err(|_| JoseError::invalid_key("invalid P-256 private scalar"))?,
        EcCurve::P384 => p384::ecdsa::SigningKey::from_slice(&d)
            .map(EcPrivateKey::P384)
            .map_err(|_| JoseError::invalid_key("invalid P-384 private scalar"))?,
    };
    if private.public_key().coordinates() != public.coordinates() {
        return Err(JoseError::invalid_key("private scalar does not match x/y"));
    }
    Ok(KeyMaterial::EcPrivate(private))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyType;

    // x/y are d·G on P-256
    const ES256_JWK: &str = r#"{"kty":"EC","crv":"P-256",
        "x":"em1Z0KbRTS6Cr5ZDvrxlmxBoq2y_jTTJ0YGLeoAYBmo",
        "y":"26MxMEzKhaep8OZAbPmLIIlTaEUq0NQmJSqRshXjjQA",
        "d":"jpsQnnGQmL-YBIffH1136cLSG2pM3ffIWcTxHBIEXHk"}"#;

    #[test]
    fn imports_ec_private_jwk() {
        let jwk: Jwk = serde_json::from_str(ES256_JWK).unwrap();
        let key = Key::from_jwk(&jwk).unwrap();
        assert_eq!(key.key_type(), KeyType::Ec);
        assert!(key.material().is_private());
        assert_eq!(key.material().curve(), Some(EcCurve::P256));

        let public = key.to_public_jwk().unwrap();
        assert_eq!(public.x.as_deref(), jwk.x.as_deref());
        assert_eq!(public.y.as_deref(), jwk.y.as_deref());
        assert_eq!(public.d, None);
    }

    #[test]
    fn rejects_mismatched_private_scalar() {
        let mut jwk: Jwk = serde_json::from_str(ES256_JWK).unwrap();
        jwk.d = Some(crate::encoding::base64_url_encode([1u8; 32]));
        assert!(matches!(Key::from_jwk(&jwk), Err(JoseError::InvalidKey(_))));
    }

    #[test]
    fn unknown_kty_and_curve_are_unsupported() {
        let okp = Jwk {
            kty: "OKP".into(),
            ..Jwk::default()
        };
        assert_eq!(
            Key::from_jwk(&okp).unwrap_err(),
            JoseError::UnsupportedKeyType("OKP".into())
        );

        let mut p521: Jwk = serde_json::from_str(ES256_JWK).unwrap();
        p521.crv = Some("P-521".into());
        assert!(matches!(
            Key::from_jwk(&p521),
            Err(JoseError::UnsupportedKeyType(_))
        ));
    }

    #[test]
    fn oct_jwk_with_usage_metadata() {
        let json = r#"{"kty":"oct","kid":"hmac-1","use":"sig","key_ops":["sign","verify"],"k":"c2VjcmV0"}"#;
        let jwk: Jwk = serde_json::from_str(json).unwrap();
        let key = Key::try_from(&jwk).unwrap();
        assert_eq!(key.kid(), Some("hmac-1"));
        assert_eq!(key.key_use(), Some(KeyUse::Signature));
        assert!(key.permits(KeyOperation::Sign));

        let bad = r#"{"kty":"oct","use":"enc","key_ops":["sign"],"k":"c2VjcmV0"}"#;
        let jwk: Jwk = serde_json::from_str(bad).unwrap();
        assert!(matches!(Key::from_jwk(&jwk), Err(JoseError::InvalidKey(_))));

        let unknown_op = r#"{"kty":"oct","key_ops":["teleport"],"k":"c2VjcmV0"}"#;
        let jwk: Jwk = serde_json::from_str(unknown_op).unwrap();
        assert!(matches!(Key::from_jwk(&jwk), Err(JoseError::InvalidKey(_))));
    }

    #[test]
    fn missing_parameters_are_reported() {
        let jwk = Jwk {
            kty: "RSA".into(),
            n: Some("AQAB".into()),
            ..Jwk::default()
        };
        assert_eq!(
            Key::from_jwk(&jwk).unwrap_err(),
            JoseError::InvalidKey("missing 'e' parameter".into())
        );
    }
}
