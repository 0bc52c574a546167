use thiserror::Error;

use super::claims::TokenType;

/// Error type for JWT operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Invalid signing secret: {0}")]
    InvalidSecret(String),

    #[error("Invalid token lifetime: {0}")]
    InvalidLifetime(String),

    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token is invalid: {0}")]
    InvalidToken(String),

    #[error("Token is expired")]
    TokenExpired,

    #[error("Expected {expected} token, got {actual}")]
    WrongTokenType { expected: TokenType, actual: String },

    #[error("Missing required claim: {0}")]
    MissingClaim(String),
}
