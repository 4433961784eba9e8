//! Generates a JSON Web Key Set for the authzd server.
//!
//! ```text
//! usage: jwkgen <alg> [<alg>...]
//! ```
//!
//! Each algorithm produces one key with a random UUID key id and
//! `key_ops: ["verify", "sign"]`. Supported: `HS256`, `HS384`, `HS512`,
//! `ES256`, `ES384`, `ES512`. The set is printed to stdout.

use std::process::ExitCode;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
struct EcJwk {
    kty: &'static str,
    key_ops: [&'static str; 2],
    kid: String,
    crv: &'static str,
    x: String,
    y: String,
    d: String,
}

#[derive(Serialize)]
struct HmacJwk {
    kty: &'static str,
    key_ops: [&'static str; 2],
    kid: String,
    alg: String,
    k: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Jwk {
    Ec(EcJwk),
    Hmac(HmacJwk),
}

#[derive(Serialize)]
struct JwkSetOut {
    keys: Vec<Jwk>,
}

fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn new_ec_jwk(alg: &str) -> Jwk {
    // The encoded point and scalar come out at the fixed field width, so
    // the JWK parameters keep their RFC 7518 lengths.
    let (crv, x, y, d) = match alg {
        "ES256" => {
            use p256::elliptic_curve::sec1::ToEncodedPoint;
            let secret = p256::SecretKey::random(&mut OsRng);
            let point = secret.public_key().to_encoded_point(false);
            (
                "P-256",
                b64(point.x().expect("uncompressed point has x")),
                b64(point.y().expect("uncompressed point has y")),
                b64(&secret.to_bytes()),
            )
        }
        "ES384" => {
            use p384::elliptic_curve::sec1::ToEncodedPoint;
            let secret = p384::SecretKey::random(&mut OsRng);
            let point = secret.public_key().to_encoded_point(false);
            (
                "P-384",
                b64(point.x().expect("uncompressed point has x")),
                b64(point.y().expect("uncompressed point has y")),
                b64(&secret.to_bytes()),
            )
        }
        "ES512" => {
            use p521::elliptic_curve::sec1::ToEncodedPoint;
            let secret = p521::SecretKey::random(&mut OsRng);
            let point = secret.public_key().to_encoded_point(false);
            (
                "P-521",
                b64(point.x().expect("uncompressed point has x")),
                b64(point.y().expect("uncompressed point has y")),
                b64(&secret.to_bytes()),
            )
        }
        other => unreachable!("unchecked algorithm {other}"),
    };
    Jwk::Ec(EcJwk {
        kty: "EC",
        key_ops: ["verify", "sign"],
        kid: Uuid::new_v4().to_string(),
        crv,
        x,
        y,
        d,
    })
}

fn new_hmac_jwk(alg: &str) -> Jwk {
    // Key size matches the digest size.
    let size = match alg {
        "HS256" => 32,
        "HS384" => 48,
        "HS512" => 64,
        other => unreachable!("unchecked algorithm {other}"),
    };
    let mut key = vec![0u8; size];
    OsRng.fill_bytes(&mut key);
    Jwk::Hmac(HmacJwk {
        kty: "oct",
        key_ops: ["verify", "sign"],
        kid: Uuid::new_v4().to_string(),
        alg: alg.to_string(),
        k: b64(&key),
    })
}

fn main() -> ExitCode {
    let algs: Vec<String> = std::env::args().skip(1).collect();
    if algs.is_empty() {
        eprintln!("usage: jwkgen <alg> [<alg>...]");
        eprintln!("supported: HS256 HS384 HS512 ES256 ES384 ES512");
        return ExitCode::FAILURE;
    }
    let mut keys = Vec::with_capacity(algs.len());
    for alg in &algs {
        match alg.as_str() {
            "ES256" | "ES384" | "ES512" => keys.push(new_ec_jwk(alg)),
            "HS256" | "HS384" | "HS512" => keys.push(new_hmac_jwk(alg)),
            other => {
                eprintln!("{other} is not a supported algorithm");
                return ExitCode::FAILURE;
            }
        }
    }
    let set = JwkSetOut { keys };
    match serde_json::to_string_pretty(&set) {
        Ok(encoded) => {
            println!("{encoded}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("cannot encode key set: {err}");
            ExitCode::FAILURE
        }
    }
}
