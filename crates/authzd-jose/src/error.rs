//! Error types for JWKS loading and JWT encoding/decoding.

/// Errors that can occur while loading a key set or processing a JWT.
#[derive(Debug, thiserror::Error)]
pub enum JoseError {
    /// The JWKS document is unusable.
    #[error("invalid key set: {message}")]
    InvalidKeySet {
        /// Description of why the key set was rejected.
        message: String,
    },

    /// No signing key with the requested key id exists in the set.
    #[error("no key with id {kid:?} available for signing")]
    UnknownSigner {
        /// The requested key id.
        kid: String,
    },

    /// No verification key matching the token's `kid` header exists in the set.
    #[error("no key with id {kid:?} available for verification")]
    UnknownVerifier {
        /// The key id from the token header.
        kid: String,
    },

    /// The token is not a well-formed compact JWS.
    #[error("malformed JWT: {message}")]
    Malformed {
        /// Description of the structural problem.
        message: String,
    },

    /// The token header cannot be decoded or is inconsistent.
    #[error("invalid JWT header: {message}")]
    BadHeader {
        /// Description of the header problem.
        message: String,
    },

    /// The token signature does not verify.
    #[error("JWT signature verification failed")]
    BadSignature,

    /// The payload cannot be serialized or deserialized.
    #[error("invalid JWT payload: {message}")]
    Payload {
        /// Description of the payload problem.
        message: String,
    },

    /// Producing a signature failed.
    #[error("signing failed: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },
}

impl JoseError {
    /// Creates a new `InvalidKeySet` error.
    #[must_use]
    pub fn invalid_key_set(message: impl Into<String>) -> Self {
        Self::InvalidKeySet {
            message: message.into(),
        }
    }

    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `BadHeader` error.
    #[must_use]
    pub fn bad_header(message: impl Into<String>) -> Self {
        Self::BadHeader {
            message: message.into(),
        }
    }

    /// Creates a new `Payload` error.
    #[must_use]
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Returns `true` if this error indicates a rejected token rather than a
    /// key-set or caller problem.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. }
                | Self::BadHeader { .. }
                | Self::BadSignature
                | Self::UnknownVerifier { .. }
        )
    }
}
