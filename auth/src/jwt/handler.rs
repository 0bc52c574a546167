use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use serde::Deserialize;
use serde::Serialize;

use super::errors::JwtError;
use super::secret::SecretKey;

/// JWT token handler for encoding and decoding tokens.
///
/// Generic over the claims type. Uses HS256 (HMAC with SHA-256).
///
/// Decoding only verifies structure, algorithm and signature. Time-based
/// claims are left to the caller so that "unparseable" and "expired" stay
/// distinguishable and can be evaluated against an injected clock.
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl JwtHandler {
    /// Create a new JWT handler from a validated secret key.
    pub fn new(secret: &SecretKey) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
        }
    }

    /// Encode claims into a JWT token.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token encoding failed
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm);

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Decode a JWT token and verify its signature.
    ///
    /// # Errors
    /// * `InvalidToken` - Token is malformed, uses another algorithm, or its
    ///   signature does not verify
    pub fn decode<T: for<'de> Deserialize<'de>>(&self, token: &str) -> Result<T, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        // Registered claims like `aud` may ride along as refresh token extras
        validation.validate_aud = false;
        validation.leeway = 0;

        let token_data = decode::<T>(token, &self.decoding_key, &validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::InvalidSignature => "signature mismatch".to_string(),
                ErrorKind::InvalidAlgorithm => "unexpected signing algorithm".to_string(),
                _ => e.to_string(),
            };
            JwtError::InvalidToken(reason)
        })?;

        Ok(token_data.claims)
    }
}
