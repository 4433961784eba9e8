//! # authzd-auth
//!
//! The OAuth 2.0 implicit-grant authorization engine (RFC 6749 §4.2).
//!
//! A browser-based client starts at the authorize endpoint, the engine
//! validates every request parameter and hands authentication to a
//! pluggable identity provider. Once the provider's callback resolves a
//! user, the engine returns a signed JWT access token in the redirect
//! URI's fragment.
//!
//! ## Modules
//!
//! - [`types`] - Clients, users, and the persisted authorization state
//! - [`clients`] - The client registry contract and implementations
//! - [`authz`] - Scope validation and per-user grants
//! - [`idp`] - The identity provider contract and registry
//! - [`state`] - TTL-bounded, single-consumption transient storage
//! - [`token`] - Access-token claims and the JWKS-backed encoder
//! - [`http`] - Axum handlers for the protocol endpoints
//!
//! ## Assembly
//!
//! ```ignore
//! use authzd_auth::AuthServerBuilder;
//! use authzd_jose::JwkSet;
//!
//! let router = AuthServerBuilder::new(JwkSet::from_json(jwks)?)
//!     .clients(clients)
//!     .authz_provider(authz)
//!     .identity_provider(idp)
//!     .token_issuer("https://auth.example.com")
//!     .build()
//!     .await?;
//! ```

pub mod authz;
pub mod clients;
pub mod error;
pub mod http;
pub mod idp;
pub mod state;
pub mod token;
pub mod types;

pub use authz::{Authz, EmptyScopeSet, ScopeSet, StaticAuthz};
pub use clients::{ClientRegistry, EmptyClientRegistry, StaticClientRegistry};
pub use error::AuthError;
pub use http::{AuthServerBuilder, AuthState, router};
pub use idp::{AuthnCallback, IdentityProvider, IdpRegistry};
pub use state::{MemoryStateKeeper, StateKeeper, StateStore};
pub use token::{AccessTokenClaims, AccessTokenEncoder};
pub use types::{AuthorizationState, Client, GrantType, User};

/// Type alias for results of engine operations.
pub type AuthResult<T> = Result<T, AuthError>;
