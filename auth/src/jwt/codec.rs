use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;

use super::claims::Claims;
use super::claims::TokenType;
use super::errors::JwtError;
use super::handler::JwtHandler;
use super::secret::SecretKey;
use crate::clock::Clock;
use crate::clock::SystemClock;

/// Lifetimes of issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenLifetimes {
    /// Longest lifetime accepted for either token, in seconds.
    pub const MAX_SECONDS: i64 = 365 * 24 * 60 * 60;

    /// # Errors
    /// * `InvalidLifetime` - A lifetime is zero, negative or longer than [`Self::MAX_SECONDS`]
    pub fn from_seconds(access: i64, refresh: i64) -> Result<Self, JwtError> {
        Ok(Self {
            access: lifetime("access", access)?,
            refresh: lifetime("refresh", refresh)?,
        })
    }
}

fn lifetime(kind: &str, seconds: i64) -> Result<Duration, JwtError> {
    if seconds <= 0 {
        return Err(JwtError::InvalidLifetime(format!(
            "{} token lifetime must be positive, got {}s",
            kind, seconds
        )));
    }

    Duration::try_seconds(seconds)
        .filter(|_| seconds <= TokenLifetimes::MAX_SECONDS)
        .ok_or_else(|| {
            JwtError::InvalidLifetime(format!(
                "{} token lifetime must not exceed {}s, got {}s",
                kind,
                TokenLifetimes::MAX_SECONDS,
                seconds
            ))
        })
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(15),
            refresh: Duration::days(7),
        }
    }
}

/// Issues and inspects access/refresh tokens signed with the process secret.
pub struct TokenCodec {
    handler: JwtHandler,
    lifetimes: TokenLifetimes,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(secret: &SecretKey, lifetimes: TokenLifetimes) -> Self {
        Self::with_clock(secret, lifetimes, Arc::new(SystemClock))
    }

    pub fn with_clock(
        secret: &SecretKey,
        lifetimes: TokenLifetimes,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            handler: JwtHandler::new(secret),
            lifetimes,
            clock,
        }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Issue a short-lived access token for `subject`.
    ///
    /// Access tokens never carry custom claims.
    pub fn issue_access_token(&self, subject: &str) -> Result<String, JwtError> {
        let claims = Claims::issued(
            subject,
            TokenType::Access,
            self.clock.now(),
            self.lifetimes.access,
        )?;
        self.handler.encode(&claims)
    }

    /// Issue a long-lived refresh token for `subject` embedding `extra_claims`.
    ///
    /// Extra claims cannot override `sub`, `iat`, `exp` or `token_type`.
    pub fn issue_refresh_token(
        &self,
        subject: &str,
        extra_claims: HashMap<String, serde_json::Value>,
    ) -> Result<String, JwtError> {
        let claims = Claims::issued(
            subject,
            TokenType::Refresh,
            self.clock.now(),
            self.lifetimes.refresh,
        )?
        .with_extras(extra_claims);
        self.handler.encode(&claims)
    }

    /// Verified claims of `token`. Expiry is not checked.
    pub fn extract_claims(&self, token: &str) -> Result<Claims, JwtError> {
        self.handler.decode(token)
    }

    /// Verified subject of `token`. Expiry is not checked.
    ///
    /// # Errors
    /// * `InvalidToken` - Malformed, wrongly signed, or without a subject
    pub fn extract_subject(&self, token: &str) -> Result<String, JwtError> {
        self.extract_claims(token)?
            .sub
            .ok_or_else(|| JwtError::InvalidToken("token has no subject".to_string()))
    }

    /// Whether `token` is past its `exp` claim.
    ///
    /// # Errors
    /// * `InvalidToken` - Token cannot be verified
    /// * `MissingClaim` - Token has no `exp` claim
    pub fn is_expired(&self, token: &str) -> Result<bool, JwtError> {
        self.claims_expired(&self.extract_claims(token)?)
    }

    /// True iff `token` names `expected_subject` and has not expired.
    ///
    /// A subject mismatch or an expired token is `Ok(false)`; a token that cannot
    /// be verified is an error.
    pub fn is_valid(&self, token: &str, expected_subject: &str) -> Result<bool, JwtError> {
        self.claims_valid_for(&self.extract_claims(token)?, expected_subject)
    }

    /// [`Self::is_valid`] over claims that were already extracted.
    ///
    /// # Errors
    /// * `InvalidToken` - Claims carry no subject
    /// * `MissingClaim` - Claims carry no `exp`
    pub fn claims_valid_for(
        &self,
        claims: &Claims,
        expected_subject: &str,
    ) -> Result<bool, JwtError> {
        let subject = claims
            .sub
            .as_deref()
            .ok_or_else(|| JwtError::InvalidToken("token has no subject".to_string()))?;
        Ok(subject == expected_subject && !self.claims_expired(claims)?)
    }

    fn claims_expired(&self, claims: &Claims) -> Result<bool, JwtError> {
        if claims.exp.is_none() {
            return Err(JwtError::MissingClaim("exp".to_string()));
        }
        Ok(claims.is_expired(self.clock.now().timestamp()))
    }

    /// Fully validate `token` as a `expected` token and return its claims.
    ///
    /// # Errors
    /// * `InvalidToken` - Token cannot be verified or has no subject
    /// * `WrongTokenType` - Token was issued for another purpose
    /// * `TokenExpired` - Token is past its `exp` claim
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let claims = self.extract_claims(token)?;

        if claims.sub.is_none() {
            return Err(JwtError::InvalidToken("token has no subject".to_string()));
        }

        match claims.token_type {
            Some(token_type) if token_type == expected => {}
            other => {
                return Err(JwtError::WrongTokenType {
                    expected,
                    actual: other.map_or("none".to_string(), |t| t.to_string()),
                })
            }
        }

        if self.claims_expired(&claims)? {
            return Err(JwtError::TokenExpired);
        }

        Ok(claims)
    }
}
