use std::sync::Arc;

use auth::Authenticator;
use auth::TokenType;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;

use super::context::SecurityContext;
use crate::domain::user::models::Principal;
use crate::domain::user::ports::PrincipalLookup;

/// Resolves the bearer token of each request into a [`SecurityContext`].
#[derive(Clone)]
pub struct AuthenticationFilter {
    authenticator: Arc<Authenticator>,
    lookup: Arc<dyn PrincipalLookup>,
    accept_query_token: bool,
}

impl AuthenticationFilter {
    pub fn new(authenticator: Arc<Authenticator>, lookup: Arc<dyn PrincipalLookup>) -> Self {
        Self {
            authenticator,
            lookup,
            accept_query_token: false,
        }
    }

    /// Also accept the token from a `token` query parameter.
    pub fn accept_query_token(mut self, accept: bool) -> Self {
        self.accept_query_token = accept;
        self
    }

    async fn resolve(&self, token: &str) -> Option<Principal> {
        let codec = self.authenticator.token_codec();

        // Single signature check; everything below reads these claims
        let claims = match codec.extract_claims(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unverifiable bearer token");
                return None;
            }
        };

        let Some(subject) = claims.sub.as_deref() else {
            tracing::debug!("Ignoring bearer token without subject");
            return None;
        };

        let principal = match self.lookup.load_principal(subject).await {
            Ok(principal) => principal,
            Err(e) => {
                tracing::warn!(subject = %subject, error = %e, "Token subject did not resolve to a principal");
                return None;
            }
        };

        if claims.token_type != Some(TokenType::Access) {
            tracing::warn!(
                subject = %subject,
                token_type = ?claims.token_type,
                "Non-access token presented as bearer"
            );
            return None;
        }

        match codec.claims_valid_for(&claims, principal.subject()) {
            Ok(true) => Some(principal),
            Ok(false) => {
                tracing::debug!(subject = %subject, "Bearer token expired");
                None
            }
            Err(e) => {
                tracing::debug!(subject = %subject, error = %e, "Bearer token rejected");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Middleware populating the request's [`SecurityContext`].
///
/// Never rejects: a missing or bad token leaves the context anonymous and
/// the security policy decides what that means for the route.
pub async fn authenticate(
    State(filter): State<AuthenticationFilter>,
    mut req: Request,
    next: Next,
) -> Response {
    let already_authenticated = req
        .extensions()
        .get::<SecurityContext>()
        .is_some_and(SecurityContext::is_authenticated);

    if already_authenticated {
        return next.run(req).await;
    }

    let principal = match extract_token(&req, filter.accept_query_token) {
        Some(token) => filter.resolve(&token).await,
        None => None,
    };

    let context = match principal {
        Some(principal) => {
            tracing::debug!(subject = %principal.subject(), "Request authenticated");
            SecurityContext::authenticated(principal)
        }
        None => SecurityContext::anonymous(),
    };

    req.extensions_mut().insert(context);
    next.run(req).await
}

/// Bearer token from the `Authorization` header, falling back to the `token`
/// query parameter when `accept_query` is set.
fn extract_token(req: &Request, accept_query: bool) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    if from_header.is_some() || !accept_query {
        return from_header;
    }

    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use auth::jwt::JwtHandler;
    use auth::Claims;
    use auth::ManualClock;
    use auth::SecretKey;
    use auth::TokenCodec;
    use auth::TokenLifetimes;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use mockall::mock;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::user::models::Role;
    use crate::user::errors::UserError;

    mock! {
        pub TestPrincipalLookup {}

        #[async_trait]
        impl PrincipalLookup for TestPrincipalLookup {
            async fn load_principal(&self, subject: &str) -> Result<Principal, UserError>;
        }
    }

    fn secret() -> SecretKey {
        SecretKey::from_bytes(b"middleware_test_secret_of_32_bytes!!".to_vec()).unwrap()
    }

    fn authenticator() -> Arc<Authenticator> {
        Arc::new(Authenticator::new(TokenCodec::new(
            &secret(),
            TokenLifetimes::default(),
        )))
    }

    fn lookup_finding(email: &'static str) -> MockTestPrincipalLookup {
        let mut lookup = MockTestPrincipalLookup::new();
        lookup
            .expect_load_principal()
            .withf(move |subject| subject == email)
            .returning(|subject| Ok(Principal::new(subject, [Role::User])));
        lookup
    }

    async fn whoami(context: SecurityContext) -> String {
        context
            .principal()
            .map_or("anonymous".to_string(), |p| p.subject().to_string())
    }

    fn app(filter: AuthenticationFilter) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn_with_state(filter, authenticate))
    }

    async fn call(app: Router, request: Request) -> String {
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn bearer(uri: &str, token: &str) -> Request {
        axum::http::Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn plain(uri: &str) -> Request {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_token_is_anonymous() {
        let mut lookup = MockTestPrincipalLookup::new();
        lookup.expect_load_principal().times(0);
        let filter = AuthenticationFilter::new(authenticator(), Arc::new(lookup));

        assert_eq!(call(app(filter), plain("/whoami")).await, "anonymous");
    }

    #[tokio::test]
    async fn test_valid_access_token_authenticates() {
        let authenticator = authenticator();
        let token = authenticator
            .token_codec()
            .issue_access_token("alice@example.com")
            .unwrap();
        let filter =
            AuthenticationFilter::new(authenticator, Arc::new(lookup_finding("alice@example.com")));

        assert_eq!(
            call(app(filter), bearer("/whoami", &token)).await,
            "alice@example.com"
        );
    }

    #[tokio::test]
    async fn test_garbage_token_is_anonymous() {
        let mut lookup = MockTestPrincipalLookup::new();
        lookup.expect_load_principal().times(0);
        let filter = AuthenticationFilter::new(authenticator(), Arc::new(lookup));

        assert_eq!(
            call(app(filter), bearer("/whoami", "not.a.jwt")).await,
            "anonymous"
        );
    }

    #[tokio::test]
    async fn test_unknown_subject_is_anonymous() {
        let authenticator = authenticator();
        let token = authenticator
            .token_codec()
            .issue_access_token("ghost@example.com")
            .unwrap();
        let mut lookup = MockTestPrincipalLookup::new();
        lookup
            .expect_load_principal()
            .returning(|subject| Err(UserError::PrincipalNotFound(subject.to_string())));
        let filter = AuthenticationFilter::new(authenticator, Arc::new(lookup));

        assert_eq!(call(app(filter), bearer("/whoami", &token)).await, "anonymous");
    }

    #[tokio::test]
    async fn test_refresh_token_does_not_authenticate() {
        let authenticator = authenticator();
        let token = authenticator
            .token_codec()
            .issue_refresh_token("alice@example.com", HashMap::new())
            .unwrap();
        let filter =
            AuthenticationFilter::new(authenticator, Arc::new(lookup_finding("alice@example.com")));

        assert_eq!(call(app(filter), bearer("/whoami", &token)).await, "anonymous");
    }

    #[tokio::test]
    async fn test_query_token_only_when_enabled() {
        let authenticator = authenticator();
        let token = authenticator
            .token_codec()
            .issue_access_token("alice@example.com")
            .unwrap();
        let uri = format!("/whoami?token={}", token);

        let disabled = AuthenticationFilter::new(
            authenticator.clone(),
            Arc::new(lookup_finding("alice@example.com")),
        );
        assert_eq!(call(app(disabled), plain(&uri)).await, "anonymous");

        let enabled =
            AuthenticationFilter::new(authenticator, Arc::new(lookup_finding("alice@example.com")))
                .accept_query_token(true);
        assert_eq!(call(app(enabled), plain(&uri)).await, "alice@example.com");
    }

    #[tokio::test]
    async fn test_header_wins_over_query() {
        let authenticator = authenticator();
        let codec = authenticator.token_codec();
        let header_token = codec.issue_access_token("alice@example.com").unwrap();
        let query_token = codec.issue_access_token("bob@example.com").unwrap();
        let uri = format!("/whoami?token={}", query_token);

        let filter =
            AuthenticationFilter::new(authenticator, Arc::new(lookup_finding("alice@example.com")))
                .accept_query_token(true);

        assert_eq!(
            call(app(filter), bearer(&uri, &header_token)).await,
            "alice@example.com"
        );
    }

    #[tokio::test]
    async fn test_existing_principal_is_kept() {
        let authenticator = authenticator();
        let token = authenticator
            .token_codec()
            .issue_access_token("alice@example.com")
            .unwrap();
        let mut lookup = MockTestPrincipalLookup::new();
        lookup.expect_load_principal().times(0);
        let filter = AuthenticationFilter::new(authenticator, Arc::new(lookup));

        let app = app(filter).layer(from_fn(|mut req: Request, next: Next| async move {
            req.extensions_mut()
                .insert(SecurityContext::authenticated(Principal::new(
                    "preset@example.com",
                    [Role::Admin],
                )));
            next.run(req).await
        }));

        assert_eq!(
            call(app, bearer("/whoami", &token)).await,
            "preset@example.com"
        );
    }

    #[tokio::test]
    async fn test_expired_access_token_is_anonymous() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let authenticator = Arc::new(Authenticator::new(TokenCodec::with_clock(
            &secret(),
            TokenLifetimes::from_seconds(60, 120).unwrap(),
            clock.clone(),
        )));
        let token = authenticator
            .token_codec()
            .issue_access_token("alice@example.com")
            .unwrap();
        let filter =
            AuthenticationFilter::new(authenticator, Arc::new(lookup_finding("alice@example.com")));

        assert_eq!(
            call(app(filter.clone()), bearer("/whoami", &token)).await,
            "alice@example.com"
        );

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(call(app(filter), bearer("/whoami", &token)).await, "anonymous");
    }

    #[tokio::test]
    async fn test_token_without_subject_skips_lookup() {
        let token = JwtHandler::new(&secret())
            .encode(
                &Claims::new()
                    .with_token_type(TokenType::Access)
                    .with_expiration(chrono::Utc::now().timestamp() + 60),
            )
            .unwrap();
        let mut lookup = MockTestPrincipalLookup::new();
        lookup.expect_load_principal().times(0);
        let filter = AuthenticationFilter::new(authenticator(), Arc::new(lookup));

        assert_eq!(
            call(app(filter), bearer("/whoami", &token)).await,
            "anonymous"
        );
    }
}
