//! HTTP surface of the authorization engine.
//!
//! Owns the two protocol endpoints plus the public key-set endpoint:
//!
//! - `GET /oauth2/authorize`: start an authorization request
//! - `GET /oauth2/callback/{idp_id}`: identity provider callback
//! - `GET /.well-known/jwks.json`: public verification keys
//!
//! Protocol errors use two channels. While no valid redirect URI is known
//! the request fails directly with a plain 4xx body; once one is known,
//! errors travel to the user agent as a 303 whose `Location` carries
//! `error` and `error_description` query parameters.

pub mod authorize;
pub mod callback;
pub mod jwks;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use url::Url;
use url::form_urlencoded;

use authzd_jose::JwkSet;

use crate::authz::{Authz, EmptyScopeSet};
use crate::clients::{ClientRegistry, EmptyClientRegistry};
use crate::error::AuthError;
use crate::idp::{IdentityProvider, IdpRegistry};
use crate::state::{MemoryStateKeeper, StateKeeper, StateStore};
use crate::token::AccessTokenEncoder;

/// Lifetime of persisted authorization state when none is configured.
const DEFAULT_STATE_LIFETIME: Duration = Duration::from_secs(60);

/// Access-token lifetime in seconds when none is configured.
const DEFAULT_TOKEN_LIFETIME: i64 = 3600;

/// Shared engine state, cloned into every handler.
#[derive(Clone)]
pub struct AuthState {
    pub(crate) keys: Arc<JwkSet>,
    pub(crate) clients: Arc<dyn ClientRegistry>,
    pub(crate) authz: Arc<dyn Authz>,
    pub(crate) idps: Arc<IdpRegistry>,
    pub(crate) store: Arc<StateStore>,
    pub(crate) tokens: Arc<AccessTokenEncoder>,
    pub(crate) trace_header: Option<String>,
}

impl AuthState {
    /// The request-correlation value from the configured trace header, or
    /// empty when unconfigured or absent.
    pub(crate) fn trace_id(&self, headers: &HeaderMap) -> String {
        self.trace_header
            .as_deref()
            .and_then(|name| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

/// Assembles the authorization engine.
///
/// Every component has a default so a bare builder produces a working (if
/// useless) engine: in-memory state kept for 60 seconds, no clients, no
/// valid scopes, no identity providers. Each default is logged at warn
/// level at build time.
pub struct AuthServerBuilder {
    keys: Arc<JwkSet>,
    state: Option<(Box<dyn StateKeeper>, Duration)>,
    clients: Option<Arc<dyn ClientRegistry>>,
    authz: Option<Arc<dyn Authz>>,
    idps: IdpRegistry,
    jwk_id: Option<String>,
    token_lifetime: i64,
    token_issuer: String,
    trace_header: Option<String>,
}

impl AuthServerBuilder {
    /// Starts a builder around the loaded key set.
    #[must_use]
    pub fn new(keys: JwkSet) -> Self {
        Self {
            keys: Arc::new(keys),
            state: None,
            clients: None,
            authz: None,
            idps: IdpRegistry::new(),
            jwk_id: None,
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            token_issuer: String::new(),
            trace_header: None,
        }
    }

    /// Sets the transient storage engine and the state lifetime.
    #[must_use]
    pub fn state_keeper(mut self, engine: Box<dyn StateKeeper>, lifetime: Duration) -> Self {
        self.state = Some((engine, lifetime));
        self
    }

    /// Sets the client registry.
    #[must_use]
    pub fn clients(mut self, clients: Arc<dyn ClientRegistry>) -> Self {
        self.clients = Some(clients);
        self
    }

    /// Sets the authorization (scope) provider.
    #[must_use]
    pub fn authz_provider(mut self, authz: Arc<dyn Authz>) -> Self {
        self.authz = Some(authz);
        self
    }

    /// Registers an identity provider. A provider already registered under
    /// the same id is silently overwritten.
    #[must_use]
    pub fn identity_provider(mut self, idp: Arc<dyn IdentityProvider>) -> Self {
        self.idps.insert(idp.id().to_string(), idp);
        self
    }

    /// Selects the signing key for access tokens. Defaults to the first key
    /// in the set.
    #[must_use]
    pub fn jwk_id(mut self, kid: impl Into<String>) -> Self {
        self.jwk_id = Some(kid.into());
        self
    }

    /// Sets the access-token lifetime in seconds.
    #[must_use]
    pub fn token_lifetime(mut self, seconds: i64) -> Self {
        self.token_lifetime = seconds;
        self
    }

    /// Sets the `iss` claim of issued access tokens.
    #[must_use]
    pub fn token_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.token_issuer = issuer.into();
        self
    }

    /// Names the request header whose value is attached to log records.
    #[must_use]
    pub fn trace_header(mut self, name: impl Into<String>) -> Self {
        self.trace_header = Some(name.into());
        self
    }

    /// Builds the engine and returns its router.
    ///
    /// Runs the state-store self-check; a backend that does not consume
    /// entries on restore is refused.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unusable signing key and a
    /// storage error for a misbehaving state backend.
    pub async fn build(self) -> Result<Router, AuthError> {
        let store = match self.state {
            Some((engine, lifetime)) => StateStore::new(engine, lifetime),
            None => {
                tracing::warn!("using in-memory state storage");
                StateStore::new(Box::new(MemoryStateKeeper::new()), DEFAULT_STATE_LIFETIME)
            }
        };
        store.self_check().await?;
        let clients = self.clients.unwrap_or_else(|| {
            tracing::warn!("no client registry given");
            Arc::new(EmptyClientRegistry)
        });
        let authz = self.authz.unwrap_or_else(|| {
            tracing::warn!("using empty scope set");
            Arc::new(EmptyScopeSet)
        });
        if self.idps.is_empty() {
            tracing::warn!("no IDP registered");
        }
        let tokens = AccessTokenEncoder::new(
            self.keys.clone(),
            self.jwk_id,
            self.token_lifetime,
            self.token_issuer,
        )?;
        Ok(router(AuthState {
            keys: self.keys,
            clients,
            authz,
            idps: Arc::new(self.idps),
            store: Arc::new(store),
            tokens: Arc::new(tokens),
            trace_header: self.trace_header,
        }))
    }
}

/// Builds the engine router over the given shared state.
pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/oauth2/authorize", get(authorize::authorize))
        .route("/oauth2/callback/{idp_id}", get(callback::callback))
        .route("/.well-known/jwks.json", get(jwks::jwks))
        .with_state(state)
}

/// A fresh 128-bit reference token, base64url-encoded without padding.
///
/// `OsRng` is a thread-safe CSPRNG, so parallel handlers draw without a
/// shared lock.
pub(crate) fn fresh_reference() -> String {
    let mut token = [0u8; 16];
    OsRng.fill_bytes(&mut token);
    URL_SAFE_NO_PAD.encode(token)
}

/// An OAuth protocol error delivered by redirect (RFC 6749 §4.2.2.1).
pub(crate) fn error_redirect(redirect_uri: &Url, error: &str, description: &str) -> Response {
    let mut uri = redirect_uri.clone();
    uri.query_pairs_mut()
        .append_pair("error", error)
        .append_pair("error_description", description);
    Redirect::to(uri.as_str()).into_response()
}

/// The implicit-grant success redirect: the access token travels in the
/// URL fragment (RFC 6749 §4.2.2). Fragment keys are emitted in canonical
/// (sorted) order; an empty `state` is omitted.
pub(crate) fn implicit_redirect(
    redirect_uri: &Url,
    access_token: &str,
    token_type: &str,
    expires_in: i64,
    scope: &[String],
    state: Option<&str>,
) -> Response {
    let mut fragment = form_urlencoded::Serializer::new(String::new());
    fragment.append_pair("access_token", access_token);
    fragment.append_pair("expires_in", &expires_in.to_string());
    fragment.append_pair("scope", &scope.join(" "));
    if let Some(state) = state.filter(|s| !s.is_empty()) {
        fragment.append_pair("state", state);
    }
    fragment.append_pair("token_type", token_type);
    let mut uri = redirect_uri.clone();
    uri.set_fragment(Some(&fragment.finish()));
    Redirect::to(uri.as_str()).into_response()
}
