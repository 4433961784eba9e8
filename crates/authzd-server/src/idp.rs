//! The anonymous identity provider.
//!
//! A development provider that skips authentication entirely: the
//! authentication redirect points straight back at its own callback with the
//! reference in a `ref` parameter, and every callback resolves to the same
//! anonymous user. Useful for local runs and smoke tests; real deployments
//! plug OIDC providers into the same contract.

use async_trait::async_trait;
use axum::http::request::Parts;
use url::Url;

use authzd_auth::{AuthError, AuthnCallback, IdentityProvider, User};

/// The provider id, also the callback path segment.
pub const ANONYMOUS_IDP_ID: &str = "anonymous";

/// An identity provider that authenticates everyone as `anonymous`.
pub struct AnonymousIdp {
    callback_url: Url,
}

impl AnonymousIdp {
    /// Creates the provider with its callback rooted under `base_url`.
    pub fn new(base_url: &Url) -> Result<Self, AuthError> {
        let callback_url = base_url
            .join(&format!("oauth2/callback/{ANONYMOUS_IDP_ID}"))
            .map_err(|e| AuthError::configuration(format!("cannot build callback URL: {e}")))?;
        Ok(Self { callback_url })
    }
}

#[async_trait]
impl IdentityProvider for AnonymousIdp {
    fn id(&self) -> &str {
        ANONYMOUS_IDP_ID
    }

    async fn authn_redirect(&self, authz_ref: &str) -> Result<Url, AuthError> {
        let mut url = self.callback_url.clone();
        url.query_pairs_mut().append_pair("ref", authz_ref);
        Ok(url)
    }

    async fn authn_callback(&self, request: &Parts) -> Result<AuthnCallback, AuthError> {
        let authz_ref = request
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned())
            .and_then(|mut pairs| pairs.find(|(k, _)| k == "ref"))
            .map(|(_, v)| v)
            .unwrap_or_default();
        // No user without the reference that produced the callback.
        let user = if authz_ref.is_empty() {
            None
        } else {
            Some(User::new("anonymous"))
        };
        Ok(AuthnCallback { authz_ref, user })
    }
}
