//! The identity provider contract and registry.
//!
//! The engine delegates end-user authentication to pluggable identity
//! providers. A provider receives a fresh reference token on the way out and
//! must hand the same reference back when the user agent returns to the
//! provider's callback endpoint, `/oauth2/callback/<idp-id>`. How the
//! reference travels (a `state` query parameter, an external session) is the
//! provider's business.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::request::Parts;
use url::Url;

use crate::error::AuthError;
use crate::types::User;

/// The result of handling an IDP callback request.
#[derive(Debug)]
pub struct AuthnCallback {
    /// The reference token given to the matching [`IdentityProvider::authn_redirect`]
    /// call. Empty when the provider cannot relate the callback to an
    /// authorization request.
    pub authz_ref: String,

    /// The authenticated user, or `None` when authentication was refused.
    /// A provider must never return a user without the reference that
    /// produced this callback.
    pub user: Option<User>,
}

/// An identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// A stable, unique identifier. Keys the registry and routes callbacks.
    fn id(&self) -> &str;

    /// Returns the URL the user agent must be redirected to for
    /// authentication. The provider embeds enough information to arrive at
    /// its own callback endpoint carrying a correlator that recovers
    /// `authz_ref` on return.
    async fn authn_redirect(&self, authz_ref: &str) -> Result<Url, AuthError>;

    /// Handles a request on the provider's callback endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport or parse failures; a clean
    /// authentication refusal is `user: None` with the reference set.
    async fn authn_callback(&self, request: &Parts) -> Result<AuthnCallback, AuthError>;
}

/// The identity provider registry, populated at bootstrap and immutable
/// thereafter.
pub type IdpRegistry = HashMap<String, Arc<dyn IdentityProvider>>;
