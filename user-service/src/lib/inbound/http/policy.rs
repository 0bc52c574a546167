use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;
use thiserror::Error;

use super::context::SecurityContext;
use crate::domain::user::models::Role;

/// Outcome of a failed authorization decision.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,
}

impl IntoResponse for AuthorizationError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthorizationError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthorizationError::Forbidden => StatusCode::FORBIDDEN,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// What a route requires from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    AnyRole(BTreeSet<Role>),
}

impl Access {
    pub fn any_role(roles: impl IntoIterator<Item = Role>) -> Self {
        Access::AnyRole(roles.into_iter().collect())
    }
}

/// Path pattern: `/prefix/**` matches the prefix and everything below it on a
/// segment boundary, anything else matches the exact path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    base: String,
    subtree: bool,
}

impl RoutePattern {
    pub fn new(pattern: &str) -> Self {
        match pattern.strip_suffix("/**") {
            Some(base) => Self {
                base: base.to_string(),
                subtree: true,
            },
            None => Self {
                base: pattern.to_string(),
                subtree: false,
            },
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        if !self.subtree {
            return path == self.base;
        }

        match path.strip_prefix(self.base.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub pattern: RoutePattern,
    pub access: Access,
}

/// Ordered route authorization table, first match wins.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    rules: Vec<RouteRule>,
    fallback: Access,
}

impl SecurityPolicy {
    /// Policy without rules; everything falls through to `fallback`.
    pub fn new(fallback: Access) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    pub fn rule(mut self, pattern: &str, access: Access) -> Self {
        self.rules.push(RouteRule {
            pattern: RoutePattern::new(pattern),
            access,
        });
        self
    }

    /// Route table of the user management API.
    pub fn standard() -> Self {
        Self::new(Access::Authenticated)
            .rule("/auth/**", Access::Public)
            .rule("/public/**", Access::Public)
            .rule("/health", Access::Public)
            .rule("/admin/**", Access::any_role([Role::Admin]))
            .rule("/user/**", Access::any_role([Role::User]))
            .rule("/adminuser/**", Access::any_role([Role::Admin, Role::User]))
    }

    pub fn access_for(&self, path: &str) -> &Access {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map_or(&self.fallback, |rule| &rule.access)
    }

    /// Decide whether the caller described by `context` may reach `path`.
    pub fn authorize(&self, path: &str, context: &SecurityContext) -> Result<(), AuthorizationError> {
        let required_roles = match self.access_for(path) {
            Access::Public => return Ok(()),
            Access::Authenticated => None,
            Access::AnyRole(roles) => Some(roles),
        };

        let principal = context
            .principal()
            .ok_or(AuthorizationError::Unauthorized)?;

        match required_roles {
            Some(roles) if !principal.has_any_role(roles) => Err(AuthorizationError::Forbidden),
            _ => Ok(()),
        }
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Middleware rejecting requests the policy does not allow.
///
/// Runs after the authentication filter and reads the context it inserted.
pub async fn enforce(
    State(policy): State<Arc<SecurityPolicy>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthorizationError> {
    let anonymous = SecurityContext::anonymous();
    let context = req
        .extensions()
        .get::<SecurityContext>()
        .unwrap_or(&anonymous);

    if let Err(e) = policy.authorize(req.uri().path(), context) {
        tracing::info!(
            method = %req.method(),
            path = %req.uri().path(),
            subject = context.principal().map(|p| p.subject()),
            decision = %e,
            "Request rejected by security policy"
        );
        return Err(e);
    }

    Ok(next.run(req).await)
}
