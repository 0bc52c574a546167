use std::collections::HashMap;

use crate::jwt::JwtError;
use crate::jwt::TokenCodec;
use crate::jwt::TokenType;
use crate::password::PasswordError;
use crate::password::PasswordHasher;

/// Authentication coordinator combining password verification and token issuance.
pub struct Authenticator {
    password_hasher: PasswordHasher,
    token_codec: TokenCodec,
}

/// Tokens handed out after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Access token minted from a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshResult {
    pub access_token: String,
    pub expires_in: i64,
}

/// Authentication operation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Refresh token does not belong to {0}")]
    SubjectMismatch(String),

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),
}

impl Authenticator {
    pub fn new(token_codec: TokenCodec) -> Self {
        Self {
            password_hasher: PasswordHasher::new(),
            token_codec,
        }
    }

    pub fn token_codec(&self) -> &TokenCodec {
        &self.token_codec
    }

    /// Verify credentials and issue an access/refresh token pair for `subject`.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Password does not match
    /// * `PasswordError` - Stored hash is unreadable
    /// * `JwtError` - Token generation failed
    pub fn authenticate(
        &self,
        password: &str,
        stored_hash: &str,
        subject: &str,
    ) -> Result<AuthenticationResult, AuthenticationError> {
        if !self.password_hasher.verify(password, stored_hash)? {
            return Err(AuthenticationError::InvalidCredentials);
        }

        let access_token = self.token_codec.issue_access_token(subject)?;
        let refresh_token = self
            .token_codec
            .issue_refresh_token(subject, HashMap::new())?;

        Ok(AuthenticationResult {
            access_token,
            refresh_token,
            expires_in: self.token_codec.lifetimes().access.num_seconds(),
        })
    }

    /// Subject named by a refresh token that is signed, unexpired and of refresh type.
    pub fn refresh_subject(&self, refresh_token: &str) -> Result<String, AuthenticationError> {
        let claims = self.token_codec.verify(refresh_token, TokenType::Refresh)?;
        claims
            .sub
            .ok_or_else(|| JwtError::MissingClaim("sub".to_string()).into())
    }

    /// Issue a new access token for `subject`, the account resolved from `refresh_token`.
    ///
    /// # Errors
    /// * `SubjectMismatch` - Refresh token names another subject or has expired
    /// * `JwtError` - Refresh token cannot be verified or token generation failed
    pub fn refresh(
        &self,
        refresh_token: &str,
        subject: &str,
    ) -> Result<RefreshResult, AuthenticationError> {
        if !self.token_codec.is_valid(refresh_token, subject)? {
            return Err(AuthenticationError::SubjectMismatch(subject.to_string()));
        }

        Ok(RefreshResult {
            access_token: self.token_codec.issue_access_token(subject)?,
            expires_in: self.token_codec.lifetimes().access.num_seconds(),
        })
    }
}
