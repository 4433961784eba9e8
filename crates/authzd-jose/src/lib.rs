//! # authzd-jose
//!
//! JSON Web Key Set handling and compact JWT signing/verification for the
//! authzd authorization server.
//!
//! This crate provides:
//! - Loading a JWKS document (RFC 7517) into signer and verifier tables
//! - Compact JWS serialization (RFC 7515) with base64url-without-padding
//! - HMAC-SHA-2 signatures (`HS256`/`HS384`/`HS512`, RFC 7518 §3.2)
//! - ECDSA signatures over the NIST curves (`ES256`/`ES384`/`ES512`,
//!   RFC 7518 §3.4) with fixed-length `R || S` encoding
//! - Export of the public verification keys for a JWKS endpoint
//!
//! Keys are routed by their `key_ops` member: keys declaring `sign` land in
//! the signer table, keys declaring `verify` in the verifier table. Key ids
//! must be unique within a set and are preserved in insertion order.

pub mod error;
mod key;
mod set;

pub use error::JoseError;
pub use set::{EcPublicJwk, JwkSet, PublicJwkSet};

/// Type alias for results of JOSE operations.
pub type JoseResult<T> = Result<T, JoseError>;
