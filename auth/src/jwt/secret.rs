use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::errors::JwtError;

/// Symmetric signing key shared by every token operation of a process.
///
/// Built once at startup from configuration and never mutated afterwards.
#[derive(Clone)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    /// Minimum key size for HS256 (256 bits).
    pub const MIN_LENGTH: usize = 32;

    /// Decode a base64 (standard alphabet, padded) secret.
    ///
    /// # Errors
    /// * `InvalidSecret` - Not valid base64, or shorter than `MIN_LENGTH` bytes once decoded
    pub fn from_base64(encoded: &str) -> Result<Self, JwtError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| JwtError::InvalidSecret(format!("not valid base64: {}", e)))?;

        Self::from_bytes(bytes)
    }

    /// Use raw key bytes.
    ///
    /// # Errors
    /// * `InvalidSecret` - Shorter than `MIN_LENGTH` bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, JwtError> {
        let bytes = bytes.into();
        if bytes.len() < Self::MIN_LENGTH {
            return Err(JwtError::InvalidSecret(format!(
                "key is {} bytes, minimum is {}",
                bytes.len(),
                Self::MIN_LENGTH
            )));
        }

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&"[hidden]").finish()
    }
}
