use std::collections::HashMap;
use std::fmt;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::errors::JwtError;

/// Purpose a token was issued for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims carried by access and refresh tokens.
///
/// Standard `sub`/`iat`/`exp` claims plus the token type. Anything else found in
/// a token lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Claims {
    /// Subject (account email)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issued at (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration time (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,

    /// Additional custom fields (flattened into token)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Create new empty claims.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims for `subject` issued at `now` and expiring `ttl` later.
    ///
    /// # Errors
    /// * `EncodingFailed` - `now + ttl` is not a representable instant
    pub fn issued(
        subject: impl ToString,
        token_type: TokenType,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, JwtError> {
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            JwtError::EncodingFailed(format!("expiry overflows: {} + {}", now, ttl))
        })?;

        Ok(Self {
            sub: Some(subject.to_string()),
            iat: Some(now.timestamp()),
            exp: Some(expires_at.timestamp()),
            token_type: Some(token_type),
            extra: HashMap::new(),
        })
    }

    /// Set subject.
    pub fn with_subject(mut self, sub: impl ToString) -> Self {
        self.sub = Some(sub.to_string());
        self
    }

    /// Set expiration (Unix timestamp).
    pub fn with_expiration(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    /// Set issued at (Unix timestamp).
    pub fn with_issued_at(mut self, iat: i64) -> Self {
        self.iat = Some(iat);
        self
    }

    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = Some(token_type);
        self
    }

    /// Add a custom field.
    pub fn with_extra(mut self, key: impl ToString, value: impl Serialize) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.extra.insert(key.to_string(), json_value);
        }
        self
    }

    /// Merge a map of custom fields. Reserved claim names are ignored.
    pub fn with_extras(mut self, extras: HashMap<String, serde_json::Value>) -> Self {
        for (key, value) in extras {
            if !Self::is_reserved(&key) {
                self.extra.insert(key, value);
            }
        }
        self
    }

    /// Check if token is expired.
    ///
    /// A token expires strictly after its `exp` second.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp.map_or(false, |exp| exp < current_timestamp)
    }

    fn is_reserved(key: &str) -> bool {
        matches!(key, "sub" | "iat" | "exp" | "token_type")
    }
}
