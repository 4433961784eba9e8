//! Server configuration, loaded from a TOML file.
//!
//! ```toml
//! base_url = "https://auth.example.com/"
//! authn_timeout_secs = 600
//! trace_header = "X-Request-ID"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [access_token]
//! jwk_set_path = "/etc/authzd/jwks.json"
//! jwk_id = "key-1"
//! lifetime_secs = 3600
//! issuer = "https://auth.example.com"
//!
//! [clients.my-client]
//! redirects = ["https://app.example.com/", "https://app.example.com/cb/*"]
//! grant_type = "token"
//!
//! [authorization]
//! scopes = ["profile:read"]
//!
//! [authorization.grants]
//! "user:1" = ["profile:read"]
//!
//! [idp]
//! anonymous = true
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use authzd_auth::GrantType;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the configuration or key-set file failed.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML does not parse into the configuration schema.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but is unusable.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

impl ConfigError {
    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bind address settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Public base URL; identity providers derive their callback URLs from
    /// it.
    pub base_url: String,

    /// Lifetime of persisted authorization state, in seconds. Bounds how
    /// long a user may take to authenticate.
    #[serde(default = "default_authn_timeout")]
    pub authn_timeout_secs: u64,

    /// Request header whose value is attached to log records, if set.
    #[serde(default)]
    pub trace_header: Option<String>,

    /// Emit log records as JSON.
    #[serde(default)]
    pub log_json: bool,

    /// Access-token settings.
    pub access_token: AccessTokenConfig,

    /// Registered clients, keyed by client id.
    #[serde(default)]
    pub clients: HashMap<String, ClientConfig>,

    /// Scope provider tables.
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Identity provider switches.
    #[serde(default)]
    pub idp: IdpConfig,
}

/// Bind address settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Access-token settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenConfig {
    /// Inline JWKS document.
    #[serde(default)]
    pub jwk_set: Option<String>,

    /// Path to a JWKS document; alternative to `jwk_set`.
    #[serde(default)]
    pub jwk_set_path: Option<PathBuf>,

    /// Signing key id; defaults to the first key in the set.
    #[serde(default)]
    pub jwk_id: Option<String>,

    /// Token lifetime in seconds.
    #[serde(default = "default_token_lifetime")]
    pub lifetime_secs: i64,

    /// The `iss` claim of issued tokens.
    #[serde(default)]
    pub issuer: String,
}

/// One registered client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Redirect URI patterns; exact URIs or prefixes ending in `*`.
    pub redirects: Vec<String>,

    /// Client secret, kept on the registration but unused in the implicit
    /// flow.
    #[serde(default)]
    pub secret: Option<String>,

    /// The single grant the client may use.
    pub grant_type: GrantType,
}

/// Tables for the static scope provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationConfig {
    /// The provider-wide valid scope set.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Granted scopes per user id.
    #[serde(default)]
    pub grants: HashMap<String, Vec<String>>,
}

/// Identity provider switches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdpConfig {
    /// Enable the anonymous development provider.
    #[serde(default)]
    pub anonymous: bool,
}

fn default_host() -> String {
    String::new()
}

fn default_port() -> u16 {
    8080
}

fn default_authn_timeout() -> u64 {
    600
}

fn default_token_lifetime() -> i64 {
    3600
}

impl Config {
    /// The address to bind the listener to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Returns the JWKS document, inline or read from disk.
    pub fn jwks_document(&self) -> Result<String, ConfigError> {
        match (&self.access_token.jwk_set, &self.access_token.jwk_set_path) {
            (Some(inline), None) => Ok(inline.clone()),
            (None, Some(path)) => Ok(std::fs::read_to_string(path)?),
            _ => Err(ConfigError::invalid(
                "exactly one of access_token.jwk_set and access_token.jwk_set_path must be set",
            )),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::invalid("base_url must be set"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid(format!("base_url: {e}")))?;
        if self.access_token.jwk_set.is_none() && self.access_token.jwk_set_path.is_none() {
            return Err(ConfigError::invalid(
                "a JSON Web Key Set must be configured (access_token.jwk_set or jwk_set_path)",
            ));
        }
        if self.access_token.jwk_set.is_some() && self.access_token.jwk_set_path.is_some() {
            return Err(ConfigError::invalid(
                "access_token.jwk_set and jwk_set_path are mutually exclusive",
            ));
        }
        if self.clients.is_empty() {
            return Err(ConfigError::invalid(
                "at least one client must be registered",
            ));
        }
        if !self.idp.anonymous {
            return Err(ConfigError::invalid(
                "at least one identity provider must be enabled",
            ));
        }
        Ok(())
    }
}

/// Loads and validates the configuration at `path`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}
