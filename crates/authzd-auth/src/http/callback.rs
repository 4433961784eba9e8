//! The per-IDP callback endpoint: resolves the user, reduces scopes, mints
//! the access token, and finishes the implicit-grant redirect.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::types::AuthorizationState;

use super::{AuthState, error_redirect, implicit_redirect};

/// `GET /oauth2/callback/{idp_id}`.
pub async fn callback(
    State(auth): State<AuthState>,
    Path(idp_id): Path<String>,
    request: Request,
) -> Response {
    let (parts, _body) = request.into_parts();
    let req_id = auth.trace_id(&parts.headers);

    let Some(idp) = auth.idps.get(&idp_id) else {
        tracing::info!(req_id = %req_id, idp_id = %idp_id, "callback for unknown IdP");
        return (StatusCode::BAD_REQUEST, format!("Unknown IdP: {idp_id}\n")).into_response();
    };

    let outcome = match idp.authn_callback(&parts).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(req_id = %req_id, idp_id = %idp_id, error = %err, "error handling IdP callback");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if outcome.authz_ref.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Can't relate callback to authorization request\n",
        )
            .into_response();
    }

    // Single consumption: the restore below removes the entry, so a
    // replayed or expired reference lands here.
    let state: AuthorizationState = match auth.store.restore(&outcome.authz_ref).await {
        Ok(state) => state,
        Err(err) => {
            tracing::info!(req_id = %req_id, error = %err, "error restoring state");
            return (StatusCode::BAD_REQUEST, "invalid state token\n").into_response();
        }
    };
    let redirect_uri = match Url::parse(&state.redirect_uri) {
        Ok(uri) => uri,
        Err(err) => {
            tracing::error!(
                req_id = %req_id,
                error = %err,
                redirect_uri = %state.redirect_uri,
                "couldn't reconstruct redirect_uri from restored state"
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(user) = outcome.user else {
        tracing::info!(req_id = %req_id, idp_id = %idp_id, "authentication refused");
        return error_redirect(&redirect_uri, "access_denied", "couldn't authenticate user");
    };

    // Reduce the requested scopes to those the user is granted, keeping
    // request order.
    let mut granted: Vec<String> = Vec::new();
    if !state.scope.is_empty() {
        let user_scopes = match auth.authz.scope_set_for(&user).await {
            Ok(set) => set,
            Err(err) => {
                tracing::error!(req_id = %req_id, error = %err, "error getting scopes for user");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        for scope in &state.scope {
            if user_scopes.valid_scope(&[scope.as_str()]) {
                granted.push(scope.clone());
            }
        }
    }

    let access_token = match auth.tokens.encode(&user.uid, &granted) {
        Ok(token) => token,
        Err(err) => {
            tracing::error!(req_id = %req_id, error = %err, "error encoding access token");
            return error_redirect(&redirect_uri, "server_error", "internal server error");
        }
    };

    let response = implicit_redirect(
        &redirect_uri,
        &access_token,
        "bearer",
        auth.tokens.lifetime(),
        &granted,
        state.state.as_deref(),
    );
    // Audit trail: the signature part identifies the token without
    // reproducing it.
    let signature = access_token.rsplit('.').next().unwrap_or_default();
    tracing::info!(
        req_id = %req_id,
        sub = %user.uid,
        token_signature = %signature,
        scopes = ?granted,
        expires_in = auth.tokens.lifetime(),
        "user authorized"
    );
    response
}
