use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use feedbox_shared::api::{UsernameAvailability, UsernameQuery};

use crate::error::AppError;
use crate::routes::AppState;
use crate::validation::validate_username;

/// GET /api/check-username-unique?username=
///
/// Only verified accounts hold a username, so pending sign-ups never make a
/// name unavailable.
pub async fn check_username_unique(
    State(state): State<AppState>,
    query: Result<Query<UsernameQuery>, QueryRejection>,
) -> Result<Json<UsernameAvailability>, AppError> {
    let Query(query) = query.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    validate_username(&query.username)?;

    let taken = state
        .store
        .find_verified_by_username(&query.username)
        .await?
        .is_some();

    let message = if taken {
        "Username is already taken"
    } else {
        "Username is unique"
    };

    Ok(Json(UsernameAvailability {
        success: true,
        available: !taken,
        message: message.to_string(),
    }))
}
