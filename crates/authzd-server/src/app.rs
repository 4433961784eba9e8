//! Router assembly and the serve loop.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, StatusCode, header};
use axum::routing::get;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use authzd_auth::{AuthServerBuilder, Client, MemoryStateKeeper, StaticAuthz, StaticClientRegistry};
use authzd_jose::JwkSet;

use crate::config::{Config, ConfigError};
use crate::idp::AnonymousIdp;

/// Errors raised while assembling or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The authorization engine refused its assembly.
    #[error(transparent)]
    Engine(#[from] authzd_auth::AuthError),

    /// The key set could not be loaded.
    #[error(transparent)]
    Keys(#[from] authzd_jose::JoseError),

    /// Binding or serving failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the full application router from configuration.
pub async fn build_router(config: &Config) -> Result<Router, ServerError> {
    let keys = JwkSet::from_json(&config.jwks_document()?)?;

    let clients: Vec<Client> = config
        .clients
        .iter()
        .map(|(id, c)| Client {
            id: id.clone(),
            redirects: c.redirects.clone(),
            secret: c.secret.clone(),
            grant_type: c.grant_type,
        })
        .collect();
    let authz = StaticAuthz::new(
        config.authorization.scopes.clone(),
        config.authorization.grants.clone(),
    );

    let mut builder = AuthServerBuilder::new(keys)
        .state_keeper(
            Box::new(MemoryStateKeeper::new()),
            Duration::from_secs(config.authn_timeout_secs),
        )
        .clients(Arc::new(StaticClientRegistry::new(clients)))
        .authz_provider(Arc::new(authz))
        .token_lifetime(config.access_token.lifetime_secs)
        .token_issuer(config.access_token.issuer.clone());
    if let Some(kid) = &config.access_token.jwk_id {
        builder = builder.jwk_id(kid.clone());
    }
    if let Some(name) = &config.trace_header {
        builder = builder.trace_header(name.clone());
    }
    if config.idp.anonymous {
        let base = base_url(config)?;
        builder = builder.identity_provider(Arc::new(AnonymousIdp::new(&base)?));
        tracing::info!("registered anonymous IdP");
    }
    let engine = builder.build().await?;

    // Token responses must never be cached along the redirect chain.
    Ok(engine
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .route("/ping", get(ping))
        .layer(TraceLayer::new_for_http()))
}

/// Runs the server until SIGINT/SIGTERM.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let router = build_router(&config).await?;
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "starting service");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

/// The configured base URL with a trailing slash, so joining callback paths
/// keeps the full base path.
fn base_url(config: &Config) -> Result<Url, ConfigError> {
    let mut base = config.base_url.clone();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base).map_err(|e| ConfigError::invalid(format!("base_url: {e}")))
}

/// Liveness probe.
async fn ping() -> StatusCode {
    StatusCode::OK
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("signal received, stopping service");
}
