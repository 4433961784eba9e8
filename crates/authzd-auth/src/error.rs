//! Authorization engine error types.

/// Errors that can occur while handling an authorization exchange.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A transient-state entry does not exist, has expired, or was already
    /// consumed.
    #[error("state not found")]
    NotFound,

    /// The state-store backend failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Encoding or decoding persisted state failed.
    #[error("state codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// The identity provider failed to produce a redirect or handle a
    /// callback.
    #[error("identity provider error: {message}")]
    IdentityProvider {
        /// Description of the provider failure.
        message: String,
    },

    /// The scope provider could not compute a user's granted scopes.
    #[error("authorization lookup failed: {message}")]
    Authorization {
        /// Description of the lookup failure.
        message: String,
    },

    /// Minting or verifying an access token failed.
    #[error("token error: {0}")]
    Token(#[from] authzd_jose::JoseError),

    /// The engine is assembled with unusable settings.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An unexpected internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Codec` error.
    #[must_use]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a new `IdentityProvider` error.
    #[must_use]
    pub fn identity_provider(message: impl Into<String>) -> Self {
        Self::IdentityProvider {
            message: message.into(),
        }
    }

    /// Creates a new `Authorization` error.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
