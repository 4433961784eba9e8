//! The JWK set: loading, JWT encoding and decoding, public key export.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::JoseError;
use crate::key::{Curve, EcSigner, EcVerifier, MacKey, Signer, Verifier};

// ============================================================================
// JWK wire structures
// ============================================================================

/// JWKS document shape used for unmarshalling (RFC 7517 §5). Keys are kept
/// raw so each one can be re-parsed according to its `kty`.
#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// Members common to every JWK (RFC 7517 §4).
#[derive(Deserialize)]
struct CommonParams {
    kty: String,
    #[serde(default)]
    key_ops: Vec<String>,
    #[serde(default)]
    kid: String,
}

/// EC key members (RFC 7518 §6.2).
#[derive(Deserialize)]
struct EcParams {
    crv: String,
    x: String,
    y: String,
    #[serde(default)]
    d: Option<String>,
}

/// Symmetric key members (RFC 7518 §6.4).
#[derive(Deserialize)]
struct OctParams {
    #[serde(default)]
    alg: Option<String>,
    k: String,
}

/// JWT header. Serialized with default `serde_json` settings so the wire
/// bytes stay stable: `{"alg":…,"kid":…}`.
#[derive(Serialize)]
struct Header<'a> {
    alg: &'a str,
    kid: &'a str,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: String,
    #[serde(default)]
    kid: String,
}

/// A public EC verification key as exposed on the JWKS endpoint. The private
/// scalar `d` is never part of this type.
#[derive(Debug, Clone, Serialize)]
pub struct EcPublicJwk {
    /// Key type; always `"EC"`.
    pub kty: String,
    /// Key operations; always `["verify"]` on the public surface.
    pub key_ops: Vec<String>,
    /// Key id.
    pub kid: String,
    /// Curve name.
    pub crv: String,
    /// Base64url-encoded x coordinate.
    pub x: String,
    /// Base64url-encoded y coordinate.
    pub y: String,
}

/// The publishable portion of a key set: asymmetric verification keys only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublicJwkSet {
    /// The keys, in set insertion order.
    pub keys: Vec<EcPublicJwk>,
}

// ============================================================================
// JwkSet
// ============================================================================

/// A loaded key set. Manages keys and encodes/decodes JWTs.
///
/// The set is immutable after loading and safe to share across request
/// handlers. Intentionally not `Debug`: signing material must never end up
/// in logs.
pub struct JwkSet {
    signers: HashMap<String, Signer>,
    verifiers: HashMap<String, Verifier>,
    kids: Vec<String>,
    public_keys: Vec<EcPublicJwk>,
}

impl JwkSet {
    /// Loads a key set from a JSON-encoded JWKS document.
    ///
    /// Every key is placed into the signer table, the verifier table, or
    /// both, according to its `key_ops`.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::InvalidKeySet`] if the JSON is malformed, a key
    /// has no `key_ops`, declares an operation other than `sign`/`verify`,
    /// reuses a key id, uses an unsupported key type or curve, or a
    /// symmetric key carries no `HS256`/`HS384`/`HS512` algorithm.
    pub fn from_json(data: &str) -> Result<Self, JoseError> {
        let document: JwksDocument = serde_json::from_str(data)
            .map_err(|e| JoseError::invalid_key_set(format!("malformed JWKS document: {e}")))?;
        let mut set = Self {
            signers: HashMap::new(),
            verifiers: HashMap::new(),
            kids: Vec::new(),
            public_keys: Vec::new(),
        };
        for (index, raw) in document.keys.iter().enumerate() {
            let common: CommonParams = serde_json::from_value(raw.clone())
                .map_err(|e| JoseError::invalid_key_set(format!("key at index {index}: {e}")))?;
            if common.key_ops.is_empty() {
                return Err(JoseError::invalid_key_set(format!(
                    "key {:?} has no key_ops",
                    common.kid
                )));
            }
            for op in &common.key_ops {
                if op != "sign" && op != "verify" {
                    return Err(JoseError::invalid_key_set(format!(
                        "unsupported key operation {op:?} on key {:?}",
                        common.kid
                    )));
                }
            }
            if set.kids.contains(&common.kid) {
                return Err(JoseError::invalid_key_set(format!(
                    "duplicate key ID {:?}",
                    common.kid
                )));
            }
            match common.kty.as_str() {
                "EC" => set.load_ec_key(&common, raw)?,
                "oct" => set.load_symmetric_key(&common, raw)?,
                other => {
                    return Err(JoseError::invalid_key_set(format!(
                        "unsupported key type {other:?} at index {index}"
                    )));
                }
            }
            set.kids.push(common.kid);
        }
        Ok(set)
    }

    fn load_ec_key(&mut self, common: &CommonParams, raw: &serde_json::Value) -> Result<(), JoseError> {
        let params: EcParams = serde_json::from_value(raw.clone())
            .map_err(|e| JoseError::invalid_key_set(format!("EC key {:?}: {e}", common.kid)))?;
        let curve = Curve::from_name(&params.crv).ok_or_else(|| {
            JoseError::invalid_key_set(format!("unsupported EC curve: {:?}", params.crv))
        })?;
        let x = decode_param("x", &params.x)?;
        let y = decode_param("y", &params.y)?;
        if common.key_ops.iter().any(|op| op == "sign") {
            let d = params.d.as_deref().ok_or_else(|| {
                JoseError::invalid_key_set(format!(
                    "EC key {:?} declares key_op \"sign\" but has no private parameter d",
                    common.kid
                ))
            })?;
            let d = decode_param("d", d)?;
            self.signers.insert(
                common.kid.clone(),
                Signer::Ec(EcSigner::from_scalar(curve, &d)?),
            );
        }
        if common.key_ops.iter().any(|op| op == "verify") {
            self.verifiers.insert(
                common.kid.clone(),
                Verifier::Ec(EcVerifier::from_coordinates(curve, &x, &y)?),
            );
            self.public_keys.push(EcPublicJwk {
                kty: "EC".to_string(),
                key_ops: vec!["verify".to_string()],
                kid: common.kid.clone(),
                crv: curve.name().to_string(),
                x: params.x.clone(),
                y: params.y.clone(),
            });
        }
        Ok(())
    }

    fn load_symmetric_key(
        &mut self,
        common: &CommonParams,
        raw: &serde_json::Value,
    ) -> Result<(), JoseError> {
        let params: OctParams = serde_json::from_value(raw.clone())
            .map_err(|e| JoseError::invalid_key_set(format!("symmetric key {:?}: {e}", common.kid)))?;
        let alg = params.alg.as_deref().ok_or_else(|| {
            JoseError::invalid_key_set(format!("symmetric key {:?} has no alg", common.kid))
        })?;
        let k = decode_param("k", &params.k)?;
        let mac = MacKey::new(alg, &k)?;
        if common.key_ops.iter().any(|op| op == "sign") {
            self.signers.insert(common.kid.clone(), Signer::Mac(mac.clone()));
        }
        if common.key_ops.iter().any(|op| op == "verify") {
            self.verifiers.insert(common.kid.clone(), Verifier::Mac(mac));
        }
        Ok(())
    }

    /// Returns all key ids in the order they appear in the document.
    ///
    /// Ordering matters: callers that don't configure an explicit signing
    /// key default to the first one.
    #[must_use]
    pub fn key_ids(&self) -> &[String] {
        &self.kids
    }

    /// Returns `true` if the given key id can be used for signing.
    #[must_use]
    pub fn has_signer(&self, kid: &str) -> bool {
        self.signers.contains_key(kid)
    }

    /// Returns the asymmetric verification keys for publication, private
    /// scalars stripped.
    #[must_use]
    pub fn verifier_jwks(&self) -> PublicJwkSet {
        PublicJwkSet {
            keys: self.public_keys.clone(),
        }
    }

    /// Creates a compact JWT from the given payload, signed with the key at
    /// the given key id.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::UnknownSigner`] if `kid` is not in the signer
    /// table, or an error if the payload cannot be serialized or signing
    /// fails.
    pub fn encode<T: Serialize>(&self, kid: &str, payload: &T) -> Result<String, JoseError> {
        let signer = self
            .signers
            .get(kid)
            .ok_or_else(|| JoseError::UnknownSigner { kid: kid.to_string() })?;
        let header = serde_json::to_vec(&Header {
            alg: signer.algorithm(),
            kid,
        })
        .map_err(|e| JoseError::payload(e.to_string()))?;
        let payload = serde_json::to_vec(payload).map_err(|e| JoseError::payload(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = signer.sign(signing_input.as_bytes())?;
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verifies the given compact JWT and decodes its payload.
    ///
    /// The verification key is selected by the `kid` header member. If the
    /// header carries an `alg` it must match the algorithm derived from that
    /// key.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::Malformed`] if the token does not have three
    /// dot-separated parts, [`JoseError::BadHeader`] if the header cannot be
    /// decoded or names the wrong algorithm, [`JoseError::UnknownVerifier`]
    /// if no key matches the header's `kid`, and [`JoseError::BadSignature`]
    /// if the signature does not verify.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, JoseError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(JoseError::malformed(format!(
                "expected 3 dot-separated parts, found {}",
                parts.len()
            )));
        }
        let (b64_header, b64_payload, b64_signature) = (parts[0], parts[1], parts[2]);
        let header_bytes = URL_SAFE_NO_PAD
            .decode(b64_header)
            .map_err(|e| JoseError::bad_header(e.to_string()))?;
        let header: RawHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| JoseError::bad_header(e.to_string()))?;
        let verifier = self
            .verifiers
            .get(&header.kid)
            .ok_or_else(|| JoseError::UnknownVerifier { kid: header.kid.clone() })?;
        if !header.alg.is_empty() && header.alg != verifier.algorithm() {
            return Err(JoseError::bad_header(format!(
                "alg {:?} does not match key {:?}",
                header.alg, header.kid
            )));
        }
        let signature = URL_SAFE_NO_PAD
            .decode(b64_signature)
            .map_err(|_| JoseError::BadSignature)?;
        let signing_input = format!("{b64_header}.{b64_payload}");
        if !verifier.verify(signing_input.as_bytes(), &signature) {
            return Err(JoseError::BadSignature);
        }
        let payload = URL_SAFE_NO_PAD
            .decode(b64_payload)
            .map_err(|e| JoseError::malformed(format!("payload: {e}")))?;
        serde_json::from_slice(&payload).map_err(|e| JoseError::payload(e.to_string()))
    }
}

fn decode_param(name: &str, value: &str) -> Result<Vec<u8>, JoseError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| JoseError::invalid_key_set(format!("invalid base64url in {name}: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
