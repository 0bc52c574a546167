use std::sync::Arc;
use std::time::Duration;

use auth::Authenticator;
use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::delete_user::delete_user;
use super::handlers::get_profile::get_profile;
use super::handlers::get_user::get_user;
use super::handlers::health::health;
use super::handlers::list_users::list_users;
use super::handlers::login::login;
use super::handlers::refresh::refresh;
use super::handlers::register::register;
use super::handlers::update_user::update_user;
use super::middleware::authenticate;
use super::middleware::AuthenticationFilter;
use super::policy::enforce;
use super::policy::SecurityPolicy;
use crate::domain::user::ports::PrincipalLookup;
use crate::domain::user::ports::UserServicePort;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<dyn UserServicePort>,
    pub principal_lookup: Arc<dyn PrincipalLookup>,
    pub authenticator: Arc<Authenticator>,
}

/// Everything the HTTP layer needs, built once at startup.
pub struct RouterConfig {
    pub user_service: Arc<dyn UserServicePort>,
    pub principal_lookup: Arc<dyn PrincipalLookup>,
    pub authenticator: Arc<Authenticator>,
    pub policy: Arc<SecurityPolicy>,
    pub accept_query_token: bool,
}

pub fn create_router(config: RouterConfig) -> Router {
    let state = AppState {
        user_service: config.user_service,
        principal_lookup: config.principal_lookup.clone(),
        authenticator: config.authenticator.clone(),
    };

    let filter = AuthenticationFilter::new(config.authenticator, config.principal_lookup)
        .accept_query_token(config.accept_query_token);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            // Headers stay out of the span: they carry bearer tokens.
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                path = %request.uri().path(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    // Layers run bottom-up: the filter populates the context before the
    // policy reads it.
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/admin/get-all-users", get(list_users))
        .route("/admin/get-users/:user_id", get(get_user))
        .route("/admin/update/:user_id", put(update_user))
        .route("/admin/delete/:user_id", delete(delete_user))
        .route("/adminuser/get-profile", get(get_profile))
        .layer(middleware::from_fn_with_state(config.policy, enforce))
        .layer(middleware::from_fn_with_state(filter, authenticate))
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
