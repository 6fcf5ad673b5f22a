//! # Auth Error Types

use thiserror::Error;

/// Ways a credential blob can fail verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The blob, the shared secret or the embedded signature is absent.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// The signature does not match the signed payload.
    #[error("invalid signature")]
    InvalidSignature,

    /// The blob or its embedded user record cannot be parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Result type for verification.
pub type AuthResult<T> = Result<T, AuthError>;
