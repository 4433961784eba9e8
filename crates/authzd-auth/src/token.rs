//! Access-token claims and the JWKS-backed encoder.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use authzd_jose::JwkSet;

use crate::error::AuthError;

/// Clock skew allowance: `nbf` is set this many seconds before `iat`.
const NOT_BEFORE_LEEWAY: i64 = 10;

/// The claim set carried by issued access tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject: the authenticated user's UID.
    pub sub: String,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    /// Not-before: issued-at minus a small leeway.
    pub nbf: i64,

    /// Expiry: issued-at plus the configured lifetime.
    pub exp: i64,

    /// JWT id, a fresh random UUID per token.
    pub jti: String,

    /// The granted scopes, in request order.
    pub scopes: Vec<String>,
}

/// Mints access tokens with the process's key set.
pub struct AccessTokenEncoder {
    keys: Arc<JwkSet>,
    key_id: String,
    lifetime: i64,
    issuer: String,
}

impl AccessTokenEncoder {
    /// Creates an encoder.
    ///
    /// Without an explicit `key_id` the first key in the set is used.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the set is empty or the chosen key
    /// cannot sign.
    pub fn new(
        keys: Arc<JwkSet>,
        key_id: Option<String>,
        lifetime: i64,
        issuer: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let key_id = match key_id {
            Some(kid) => kid,
            None => keys
                .key_ids()
                .first()
                .cloned()
                .ok_or_else(|| AuthError::configuration("key set contains no keys"))?,
        };
        if !keys.has_signer(&key_id) {
            return Err(AuthError::configuration(format!(
                "key {key_id:?} cannot be used for signing"
            )));
        }
        Ok(Self {
            keys,
            key_id,
            lifetime,
            issuer: issuer.into(),
        })
    }

    /// The access-token lifetime in seconds, as advertised in `expires_in`.
    #[must_use]
    pub fn lifetime(&self) -> i64 {
        self.lifetime
    }

    /// The `iss` claim value.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The key id used for signing.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Mints a token for the given subject carrying the granted scopes.
    pub fn encode(&self, subject: &str, scopes: &[String]) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            iat: now,
            nbf: now - NOT_BEFORE_LEEWAY,
            exp: now + self.lifetime,
            jti: Uuid::new_v4().to_string(),
            scopes: scopes.to_vec(),
        };
        Ok(self.keys.encode(&self.key_id, &claims)?)
    }
}
