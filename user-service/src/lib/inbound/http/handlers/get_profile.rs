use axum::extract::State;
use axum::http::StatusCode;

use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::context::AuthenticatedPrincipal;
use crate::inbound::http::router::AppState;
use crate::user::errors::UserError;

/// Account of the authenticated caller.
pub async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
) -> Result<ApiSuccess<UserData>, ApiError> {
    let email = EmailAddress::new(principal.subject().to_string()).map_err(UserError::from)?;

    state
        .user_service
        .get_user_by_email(&email)
        .await
        .map_err(ApiError::from)
        .map(|ref user| ApiSuccess::new(StatusCode::OK, user.into()))
}
