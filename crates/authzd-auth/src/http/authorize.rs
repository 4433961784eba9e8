//! The authorize endpoint: validates an authorization request and redirects
//! the user agent to the chosen identity provider.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use url::Url;

use crate::types::AuthorizationState;

use super::{AuthState, error_redirect, fresh_reference};

/// Query parameters of an authorization request (RFC 6749 §4.2.1). All
/// optional at the type level so each absence maps to its own protocol
/// error.
#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    /// The client identifier.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Requested redirect URI; may be omitted when the client has exactly
    /// one registered redirect.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Must equal the client's registered grant type.
    #[serde(default)]
    pub response_type: Option<String>,

    /// Opaque client state, echoed back on the final redirect.
    #[serde(default)]
    pub state: Option<String>,

    /// Space-separated requested scopes.
    #[serde(default)]
    pub scope: Option<String>,

    /// The identity provider to authenticate against.
    #[serde(default)]
    pub idp_id: Option<String>,
}

/// `GET /oauth2/authorize`.
pub async fn authorize(
    State(auth): State<AuthState>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let req_id = auth.trace_id(&headers);

    // client_id: required, must be registered. Failures here have no
    // trusted redirect URI yet, so they fail the HTTP request directly.
    let Some(client_id) = params.client_id else {
        tracing::info!(req_id = %req_id, "missing client_id");
        return (StatusCode::BAD_REQUEST, "missing client_id\n").into_response();
    };
    let Some(client) = auth.clients.get(&client_id) else {
        tracing::info!(req_id = %req_id, client_id = %client_id, "invalid client_id");
        return (StatusCode::BAD_REQUEST, "invalid client_id\n").into_response();
    };

    // redirect_uri: first matching registered pattern wins; a single
    // registration doubles as the default.
    let Some(redirect) = client.match_redirect(params.redirect_uri.as_deref()) else {
        tracing::info!(req_id = %req_id, client_id = %client_id, "missing or invalid redirect_uri");
        return (StatusCode::BAD_REQUEST, "missing or invalid redirect_uri\n").into_response();
    };
    let redirect_uri = match Url::parse(&redirect) {
        Ok(uri) => uri,
        Err(err) => {
            tracing::error!(req_id = %req_id, error = %err, "registered redirect is invalid");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // From here on the redirect URI is trusted and protocol errors travel
    // back to the client as OAuth error redirects.
    let Some(response_type) = params.response_type else {
        tracing::info!(req_id = %req_id, "invalid_request: response_type missing");
        return error_redirect(&redirect_uri, "invalid_request", "response_type missing");
    };
    if response_type != client.grant_type.as_str() {
        tracing::info!(req_id = %req_id, response_type = %response_type, "unsupported_response_type");
        return error_redirect(
            &redirect_uri,
            "unsupported_response_type",
            "response_type not supported for client",
        );
    }

    // scope: every requested scope must be in the provider's valid set;
    // duplicates are coalesced, first occurrence wins.
    let mut scopes: Vec<String> = Vec::new();
    if let Some(requested) = params.scope.as_deref() {
        for scope in requested.split(' ') {
            if !auth.authz.valid_scope(&[scope]) {
                tracing::info!(req_id = %req_id, scope = %scope, "invalid scope");
                return error_redirect(
                    &redirect_uri,
                    "invalid_scope",
                    &format!("invalid scope: {scope}"),
                );
            }
            if !scopes.iter().any(|s| s == scope) {
                scopes.push(scope.to_string());
            }
        }
    }

    // idp_id: required, must be registered.
    let Some(idp_id) = params.idp_id else {
        tracing::info!(req_id = %req_id, "invalid_request: idp_id missing");
        return error_redirect(&redirect_uri, "invalid_request", "idp_id missing");
    };
    let Some(idp) = auth.idps.get(&idp_id) else {
        tracing::info!(req_id = %req_id, idp_id = %idp_id, "invalid_request: unknown idp_id");
        return error_redirect(&redirect_uri, "invalid_request", "unknown idp_id");
    };

    let authz_state = AuthorizationState {
        client_id: client.id.clone(),
        redirect_uri: redirect_uri.to_string(),
        response_type: client.grant_type.as_str().to_string(),
        scope: scopes,
        state: params.state,
        idp_id: idp_id.clone(),
    };

    // The state must be persisted before the redirect goes out: once the
    // user agent leaves, the callback may arrive on any other worker.
    let authz_ref = fresh_reference();
    let authn_url = match idp.authn_redirect(&authz_ref).await {
        Ok(url) => url,
        Err(err) => {
            tracing::error!(req_id = %req_id, error = %err, "couldn't create authentication redirect");
            return error_redirect(&redirect_uri, "server_error", "internal server error");
        }
    };
    if let Err(err) = auth.store.persist(&authz_ref, &authz_state).await {
        tracing::error!(req_id = %req_id, error = %err, "couldn't persist authorization state");
        return error_redirect(&redirect_uri, "server_error", "internal server error");
    }

    tracing::info!(
        req_id = %req_id,
        client_id = %authz_state.client_id,
        idp_id = %authz_state.idp_id,
        "redirected to IdP"
    );
    Redirect::to(authn_url.as_str()).into_response()
}
