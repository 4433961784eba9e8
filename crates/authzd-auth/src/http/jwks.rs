//! The public key-set endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use super::AuthState;

/// `GET /.well-known/jwks.json`.
///
/// Serves the asymmetric verification keys so resource servers can verify
/// issued tokens. Private material never appears here.
pub async fn jwks(State(auth): State<AuthState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "public, max-age=3600")],
        Json(auth.keys.verifier_jwks()),
    )
}
