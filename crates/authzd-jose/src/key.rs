//! Individual key material: HMAC secrets and ECDSA key pairs.
//!
//! A key is split into its signing and verifying halves at load time so the
//! set can route it into the signer and verifier tables independently, per
//! its declared `key_ops`.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use p256::ecdsa::signature::{Signer as _, Verifier as _};

use crate::error::JoseError;

/// NIST curves supported for ECDSA keys (RFC 7518 §3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    /// Maps a JWK `crv` member to a curve.
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(Self::P256),
            "P-384" => Some(Self::P384),
            "P-521" => Some(Self::P521),
            _ => None,
        }
    }

    /// The JWK `crv` member for this curve.
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// The JWS algorithm derived from this curve.
    pub(crate) fn algorithm(self) -> &'static str {
        match self {
            Self::P256 => "ES256",
            Self::P384 => "ES384",
            Self::P521 => "ES512",
        }
    }

    /// Byte length of one field element (and of each signature half).
    pub(crate) fn field_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    /// Total length of the fixed-length `R || S` signature.
    pub(crate) fn signature_len(self) -> usize {
        self.field_len() * 2
    }
}

/// Left-pads a big-endian field element to the curve's fixed width.
fn left_pad(bytes: &[u8], width: usize) -> Result<Vec<u8>, JoseError> {
    if bytes.len() > width {
        return Err(JoseError::invalid_key_set(format!(
            "field element of {} bytes exceeds curve width {width}",
            bytes.len()
        )));
    }
    let mut out = vec![0u8; width];
    out[width - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

/// A symmetric HMAC key, usable for both signing and verification.
///
/// The initialized MAC is kept as a prototype and cloned per operation, so
/// key-length validation happens once at load time.
#[derive(Clone)]
pub(crate) enum MacKey {
    Hs256(Hmac<Sha256>),
    Hs384(Hmac<Sha384>),
    Hs512(Hmac<Sha512>),
}

impl MacKey {
    /// Builds an HMAC key from the JWK `alg` member and raw key bytes.
    pub(crate) fn new(alg: &str, key: &[u8]) -> Result<Self, JoseError> {
        let invalid = |e: hmac::digest::InvalidLength| {
            JoseError::invalid_key_set(format!("unusable symmetric key: {e}"))
        };
        match alg {
            "HS256" => Hmac::new_from_slice(key).map(Self::Hs256).map_err(invalid),
            "HS384" => Hmac::new_from_slice(key).map(Self::Hs384).map_err(invalid),
            "HS512" => Hmac::new_from_slice(key).map(Self::Hs512).map_err(invalid),
            other => Err(JoseError::invalid_key_set(format!(
                "invalid alg for symmetric key: {other:?}"
            ))),
        }
    }

    pub(crate) fn algorithm(&self) -> &'static str {
        match self {
            Self::Hs256(_) => "HS256",
            Self::Hs384(_) => "HS384",
            Self::Hs512(_) => "HS512",
        }
    }

    pub(crate) fn sign(&self, msg: &[u8]) -> Vec<u8> {
        match self {
            Self::Hs256(proto) => {
                let mut mac = proto.clone();
                mac.update(msg);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Hs384(proto) => {
                let mut mac = proto.clone();
                mac.update(msg);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Hs512(proto) => {
                let mut mac = proto.clone();
                mac.update(msg);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }

    /// Constant-time comparison of the expected digest against the presented one.
    pub(crate) fn verify(&self, msg: &[u8], signature: &[u8]) -> bool {
        self.sign(msg).ct_eq(signature).into()
    }
}

/// An ECDSA signing key on one of the supported curves.
pub(crate) enum EcSigner {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(p521::ecdsa::SigningKey),
}

impl EcSigner {
    /// Builds a signing key from the JWK private scalar `d`.
    pub(crate) fn from_scalar(curve: Curve, d: &[u8]) -> Result<Self, JoseError> {
        let d = left_pad(d, curve.field_len())?;
        let invalid =
            |e: p256::ecdsa::Error| JoseError::invalid_key_set(format!("invalid EC private key: {e}"));
        match curve {
            Curve::P256 => p256::ecdsa::SigningKey::from_slice(&d)
                .map(Self::P256)
                .map_err(invalid),
            Curve::P384 => p384::ecdsa::SigningKey::from_slice(&d)
                .map(Self::P384)
                .map_err(invalid),
            Curve::P521 => p521::ecdsa::SigningKey::from_slice(&d)
                .map(Self::P521)
                .map_err(invalid),
        }
    }

    pub(crate) fn curve(&self) -> Curve {
        match self {
            Self::P256(_) => Curve::P256,
            Self::P384(_) => Curve::P384,
            Self::P521(_) => Curve::P521,
        }
    }

    /// Signs the message and emits the fixed-length `R || S` form, each half
    /// zero-padded to the curve width (RFC 7518 §3.4). The message is hashed
    /// with the curve's SHA-2 variant.
    pub(crate) fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, JoseError> {
        let failed = |e: p256::ecdsa::Error| JoseError::signing(e.to_string());
        match self {
            Self::P256(key) => {
                let signature: p256::ecdsa::Signature = key.try_sign(msg).map_err(failed)?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::P384(key) => {
                let signature: p384::ecdsa::Signature = key.try_sign(msg).map_err(failed)?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::P521(key) => {
                let signature: p521::ecdsa::Signature = key.try_sign(msg).map_err(failed)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

/// An ECDSA verification key on one of the supported curves.
pub(crate) enum EcVerifier {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
}

impl EcVerifier {
    /// Builds a verification key from the JWK `x`/`y` coordinates.
    pub(crate) fn from_coordinates(curve: Curve, x: &[u8], y: &[u8]) -> Result<Self, JoseError> {
        let width = curve.field_len();
        let mut sec1 = Vec::with_capacity(1 + 2 * width);
        sec1.push(0x04);
        sec1.extend_from_slice(&left_pad(x, width)?);
        sec1.extend_from_slice(&left_pad(y, width)?);
        let invalid =
            |e: p256::ecdsa::Error| JoseError::invalid_key_set(format!("invalid EC public key: {e}"));
        match curve {
            Curve::P256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                .map(Self::P256)
                .map_err(invalid),
            Curve::P384 => p384::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                .map(Self::P384)
                .map_err(invalid),
            Curve::P521 => p521::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                .map(Self::P521)
                .map_err(invalid),
        }
    }

    pub(crate) fn curve(&self) -> Curve {
        match self {
            Self::P256(_) => Curve::P256,
            Self::P384(_) => Curve::P384,
            Self::P521(_) => Curve::P521,
        }
    }

    /// Verifies a fixed-length `R || S` signature. The signature must be
    /// exactly twice the curve width; anything else fails verification.
    pub(crate) fn verify(&self, msg: &[u8], signature: &[u8]) -> bool {
        if signature.len() != self.curve().signature_len() {
            return false;
        }
        match self {
            Self::P256(key) => p256::ecdsa::Signature::from_slice(signature)
                .map(|s| key.verify(msg, &s).is_ok())
                .unwrap_or(false),
            Self::P384(key) => p384::ecdsa::Signature::from_slice(signature)
                .map(|s| key.verify(msg, &s).is_ok())
                .unwrap_or(false),
            Self::P521(key) => p521::ecdsa::Signature::from_slice(signature)
                .map(|s| key.verify(msg, &s).is_ok())
                .unwrap_or(false),
        }
    }
}

/// A key usable for producing signatures.
pub(crate) enum Signer {
    Mac(MacKey),
    Ec(EcSigner),
}

impl Signer {
    pub(crate) fn algorithm(&self) -> &'static str {
        match self {
            Self::Mac(key) => key.algorithm(),
            Self::Ec(key) => key.curve().algorithm(),
        }
    }

    pub(crate) fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, JoseError> {
        match self {
            Self::Mac(key) => Ok(key.sign(msg)),
            Self::Ec(key) => key.sign(msg),
        }
    }
}

/// A key usable for verifying signatures.
pub(crate) enum Verifier {
    Mac(MacKey),
    Ec(EcVerifier),
}

impl Verifier {
    pub(crate) fn algorithm(&self) -> &'static str {
        match self {
            Self::Mac(key) => key.algorithm(),
            Self::Ec(key) => key.curve().algorithm(),
        }
    }

    pub(crate) fn verify(&self, msg: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::Mac(key) => key.verify(msg, signature),
            Self::Ec(key) => key.verify(msg, signature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_parameters() {
        assert_eq!(Curve::from_name("P-256"), Some(Curve::P256));
        assert_eq!(Curve::from_name("P-384"), Some(Curve::P384));
        assert_eq!(Curve::from_name("P-521"), Some(Curve::P521));
        assert_eq!(Curve::from_name("secp256k1"), None);

        assert_eq!(Curve::P256.algorithm(), "ES256");
        assert_eq!(Curve::P384.algorithm(), "ES384");
        assert_eq!(Curve::P521.algorithm(), "ES512");

        assert_eq!(Curve::P256.signature_len(), 64);
        assert_eq!(Curve::P384.signature_len(), 96);
        assert_eq!(Curve::P521.signature_len(), 132);
    }

    #[test]
    fn left_pad_widens_and_rejects_overflow() {
        assert_eq!(left_pad(&[1, 2], 4).unwrap(), vec![0, 0, 1, 2]);
        assert_eq!(left_pad(&[1, 2, 3, 4], 4).unwrap(), vec![1, 2, 3, 4]);
        assert!(left_pad(&[1, 2, 3, 4, 5], 4).is_err());
    }

    #[test]
    fn mac_key_rejects_unknown_alg() {
        assert!(matches!(
            MacKey::new("HS1024", b"secret"),
            Err(JoseError::InvalidKeySet { .. })
        ));
    }

    #[test]
    fn mac_sign_and_verify() {
        let key = MacKey::new("HS256", b"a-reasonably-long-shared-secret").unwrap();
        let digest = key.sign(b"message");
        assert_eq!(digest.len(), 32);
        assert!(key.verify(b"message", &digest));
        assert!(!key.verify(b"other message", &digest));

        let mut flipped = digest.clone();
        flipped[0] ^= 0x01;
        assert!(!key.verify(b"message", &flipped));
    }

    #[test]
    fn mac_digest_lengths_per_alg() {
        for (alg, len) in [("HS256", 32), ("HS384", 48), ("HS512", 64)] {
            let key = MacKey::new(alg, b"secret").unwrap();
            assert_eq!(key.sign(b"m").len(), len, "{alg}");
            assert_eq!(key.algorithm(), alg);
        }
    }
}
