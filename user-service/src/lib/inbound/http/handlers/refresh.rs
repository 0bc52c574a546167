use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::ports::PrincipalLookup;
use crate::inbound::http::router::AppState;

/// Exchange a refresh token for a new access token.
///
/// The refresh token itself is returned unchanged; it stays usable until it
/// expires.
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequestBody>,
) -> Result<ApiSuccess<RefreshResponseData>, ApiError> {
    let subject = state.authenticator.refresh_subject(&body.refresh_token)?;

    let principal = state
        .principal_lookup
        .load_principal(&subject)
        .await
        .map_err(ApiError::from)?;

    let result = state
        .authenticator
        .refresh(&body.refresh_token, principal.subject())?;

    tracing::debug!(subject = %principal.subject(), "Access token refreshed");

    Ok(ApiSuccess::new(
        StatusCode::OK,
        RefreshResponseData {
            access_token: result.access_token,
            refresh_token: body.refresh_token,
            expires_in: result.expires_in,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshRequestBody {
    refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshResponseData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}
