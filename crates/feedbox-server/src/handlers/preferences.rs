use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use feedbox_shared::api::{AcceptMessagesRequest, AcceptMessagesResponse, AcceptingStatusResponse};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::handlers::json_body;
use crate::routes::AppState;

/// POST /api/accept-messages
///
/// `acceptMessages` must be a JSON boolean; anything else is a 400.
pub async fn set_accept_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<AcceptMessagesRequest>, JsonRejection>,
) -> Result<Json<AcceptMessagesResponse>, AppError> {
    let req = json_body(body)?;

    let updated = state
        .store
        .set_accepting_messages(user.id, req.accept_messages)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    tracing::debug!(
        username = %user.username,
        accepting = req.accept_messages,
        "Message preference updated"
    );
    Ok(Json(AcceptMessagesResponse {
        success: true,
        message: "Message acceptance status updated successfully".to_string(),
        updated_user: updated.to_view(),
    }))
}

/// GET /api/accept-messages
pub async fn get_accept_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AcceptingStatusResponse>, AppError> {
    let record = state
        .store
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    Ok(Json(AcceptingStatusResponse {
        success: true,
        is_accepting_messages: record.is_accepting_messages,
    }))
}
