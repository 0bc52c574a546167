use std::sync::Arc;

use auth::Authenticator;
use auth::ManualClock;
use auth::SecretKey;
use auth::TokenCodec;
use auth::TokenLifetimes;
use chrono::TimeZone;
use chrono::Utc;
use serde_json::json;
use serde_json::Value;
use user_service::domain::user::models::EmailAddress;
use user_service::domain::user::models::RegisterUserCommand;
use user_service::domain::user::ports::PrincipalLookup;
use user_service::domain::user::ports::UserServicePort;
use user_service::domain::user::service::UserService;
use user_service::inbound::http::policy::SecurityPolicy;
use user_service::inbound::http::router::create_router;
use user_service::inbound::http::router::RouterConfig;
use user_service::outbound::repositories::InMemoryUserRepository;

pub const TEST_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";
pub const ACCESS_TTL_SECONDS: i64 = 60;
pub const REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const PASSWORD: &str = "pass_word!";

/// Test application that spawns a real server over the in-memory store
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub clock: Arc<ManualClock>,
    pub codec: TokenCodec,
    pub user_service: Arc<dyn UserServicePort>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(false).await
    }

    /// Spawn the application in a background task and return TestApp
    pub async fn spawn_with(accept_query_token: bool) -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let secret = SecretKey::from_bytes(TEST_SECRET.to_vec()).unwrap();
        let lifetimes = TokenLifetimes::from_seconds(ACCESS_TTL_SECONDS, REFRESH_TTL_SECONDS).unwrap();

        let authenticator = Arc::new(Authenticator::new(TokenCodec::with_clock(
            &secret,
            lifetimes,
            clock.clone(),
        )));
        // Same key and clock as the server, for forging tokens in tests
        let codec = TokenCodec::with_clock(&secret, lifetimes, clock.clone());

        let service = Arc::new(UserService::new(Arc::new(InMemoryUserRepository::new())));
        let user_service: Arc<dyn UserServicePort> = service.clone();
        let principal_lookup: Arc<dyn PrincipalLookup> = service;

        let router = create_router(RouterConfig {
            user_service: user_service.clone(),
            principal_lookup,
            authenticator,
            policy: Arc::new(SecurityPolicy::standard()),
            accept_query_token,
        });

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server error");
        });

        Self {
            address,
            api_client: reqwest::Client::new(),
            clock,
            codec,
            user_service,
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(&format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(&format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make PUT request with Bearer token
    pub fn put_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client
            .put(&format!("{}{}", self.address, path))
            .bearer_auth(token)
    }

    /// Helper to make DELETE request with Bearer token
    pub fn delete_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client
            .delete(&format!("{}{}", self.address, path))
            .bearer_auth(token)
    }

    /// Register a USER account through the API and return its `data` object
    pub async fn register(&self, name: &str, email: &str) -> Value {
        let response = self
            .post("/auth/register")
            .json(&json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "city": "Turin"
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"].clone()
    }

    /// Create an ADMIN account directly through the service
    pub async fn seed_admin(&self, email: &str) {
        self.user_service
            .ensure_admin(RegisterUserCommand::new(
                "Admin".to_string(),
                EmailAddress::new(email.to_string()).unwrap(),
                PASSWORD.to_string(),
                None,
            ))
            .await
            .expect("Failed to seed admin");
    }

    /// Log in and return the whole `data` object of the response
    pub async fn login(&self, email: &str) -> Value {
        let response = self
            .post("/auth/login")
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"].clone()
    }

    /// Log in and return the access token
    pub async fn access_token(&self, email: &str) -> String {
        self.login(email).await["access_token"]
            .as_str()
            .expect("access_token missing")
            .to_string()
    }
}
