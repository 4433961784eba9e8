//! Domain types for the authorization engine.

use serde::{Deserialize, Serialize};

// =============================================================================
// Grant Type
// =============================================================================

/// The single grant a client is allowed to use.
///
/// Only the implicit grant (`token`) is served by this engine; the other
/// values exist so registrations can be carried over verbatim, and any
/// mismatch surfaces as `unsupported_response_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Implicit grant: `response_type=token`.
    Token,
    /// Authorization code grant: `response_type=code`.
    Code,
    /// Client credentials grant.
    ClientCredentials,
}

impl GrantType {
    /// Returns the `response_type` value matching this grant.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Code => "code",
            Self::ClientCredentials => "client_credentials",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth 2.0 client.
///
/// Loaded at bootstrap and immutable for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier.
    pub id: String,

    /// Registered redirect URI patterns, in registration order. A pattern is
    /// either an exact URI or an exact prefix followed by a literal `*`.
    pub redirects: Vec<String>,

    /// Client secret. Unused in the implicit flow but kept on the
    /// registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// The single grant this client may use.
    pub grant_type: GrantType,
}

impl Client {
    /// Resolves the effective redirect URI for a request.
    ///
    /// With a requested URI, the first registered pattern that matches wins:
    /// exact equality, or prefix match when the pattern ends in `*`. Without
    /// a requested URI the single registered redirect is used, if there is
    /// exactly one. Returns `None` when no redirect can be determined.
    #[must_use]
    pub fn match_redirect(&self, requested: Option<&str>) -> Option<String> {
        match requested {
            Some(uri) => {
                for pattern in &self.redirects {
                    if let Some(prefix) = pattern.strip_suffix('*') {
                        // Partial match up to the '*', e.g.
                        // http://host/redirect/anywhere matches http://host/redirect/*
                        if uri.starts_with(prefix) {
                            return Some(uri.to_string());
                        }
                    } else if uri == pattern {
                        return Some(pattern.clone());
                    }
                }
                None
            }
            None if self.redirects.len() == 1 => Some(self.redirects[0].clone()),
            None => None,
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// An authenticated principal as resolved by an identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier; becomes the JWT subject.
    pub uid: String,

    /// Opaque provider-specific data. The engine never inspects this; the
    /// scope provider may use it to derive the user's granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl User {
    /// Creates a user with no provider data.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            data: None,
        }
    }

    /// Creates a user carrying provider-specific data.
    #[must_use]
    pub fn with_data(uid: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            uid: uid.into(),
            data: Some(data),
        }
    }
}

// =============================================================================
// AuthorizationState
// =============================================================================

/// The full context of an in-flight authorization request, persisted under
/// the reference token for the duration of the IDP round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationState {
    /// The requesting client.
    pub client_id: String,

    /// The redirect URI chosen after matching against the registration.
    pub redirect_uri: String,

    /// The validated response type; equals the client's grant type.
    pub response_type: String,

    /// Requested scopes, deduplicated, in request order.
    pub scope: Vec<String>,

    /// The client's opaque `state` parameter, echoed back on the final
    /// redirect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// The identity provider handling authentication for this request.
    pub idp_id: String,
}
