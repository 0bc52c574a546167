//! Authentication utilities library
//!
//! Token and credential infrastructure for the user service:
//! - Secret key derivation from configuration
//! - Access/refresh JWT issuance and inspection (HS256)
//! - Password hashing (Argon2id)
//! - Authentication coordination
//!
//! # Examples
//!
//! ## Tokens
//! ```
//! use std::collections::HashMap;
//!
//! use auth::{SecretKey, TokenCodec, TokenLifetimes};
//!
//! let secret = SecretKey::from_bytes(b"secret_key_at_least_32_bytes_long!".to_vec()).unwrap();
//! let codec = TokenCodec::new(&secret, TokenLifetimes::default());
//!
//! let access = codec.issue_access_token("alice@example.com").unwrap();
//! assert_eq!(codec.extract_subject(&access).unwrap(), "alice@example.com");
//! assert!(codec.is_valid(&access, "alice@example.com").unwrap());
//!
//! let refresh = codec.issue_refresh_token("alice@example.com", HashMap::new()).unwrap();
//! assert!(!codec.is_expired(&refresh).unwrap());
//! ```
//!
//! ## Login
//! ```
//! use auth::{Authenticator, PasswordHasher, SecretKey, TokenCodec, TokenLifetimes};
//!
//! let secret = SecretKey::from_bytes(b"secret_key_at_least_32_bytes_long!".to_vec()).unwrap();
//! let auth = Authenticator::new(TokenCodec::new(&secret, TokenLifetimes::default()));
//!
//! // Register: hash password
//! let hash = PasswordHasher::new().hash("password123").unwrap();
//!
//! // Login: verify and issue tokens
//! let result = auth.authenticate("password123", &hash, "alice@example.com").unwrap();
//!
//! // Refresh
//! let subject = auth.refresh_subject(&result.refresh_token).unwrap();
//! let refreshed = auth.refresh(&result.refresh_token, &subject).unwrap();
//! assert!(!refreshed.access_token.is_empty());
//! ```

pub mod authenticator;
pub mod clock;
pub mod jwt;
pub mod password;

pub use authenticator::AuthenticationError;
pub use authenticator::AuthenticationResult;
pub use authenticator::Authenticator;
pub use authenticator::RefreshResult;
pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::SecretKey;
pub use jwt::TokenCodec;
pub use jwt::TokenLifetimes;
pub use jwt::TokenType;
pub use password::PasswordError;
pub use password::PasswordHasher;
