use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use feedbox_shared::{
    api::{ApiResponse, MessagesResponse, SendMessageRequest},
    newest_first, Message,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::handlers::json_body;
use crate::routes::AppState;

const NOT_ACCEPTING: &str = "User is not accepting messages";

/// POST /api/send-message
///
/// Anonymous: nothing about the sender is recorded.
pub async fn send_message(
    State(state): State<AppState>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse>), AppError> {
    let req = json_body(body)?;

    let user = state
        .store
        .find_by_username(&req.username)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    if !user.is_accepting_messages {
        return Err(AppError::Forbidden(NOT_ACCEPTING));
    }

    let message = Message::new(req.content, Utc::now());

    // The store re-checks the flag so a concurrent opt-out wins
    if !state.store.append_message(user.id, &message).await? {
        return Err(AppError::Forbidden(NOT_ACCEPTING));
    }

    tracing::debug!(recipient = %user.id, message_id = %message.id, "Message delivered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Message sent successfully")),
    ))
}

/// GET /api/get-messages
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MessagesResponse>, AppError> {
    let record = state
        .store
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    tracing::debug!(
        username = %user.username,
        count = record.messages.len(),
        "Listing messages"
    );
    Ok(Json(MessagesResponse {
        success: true,
        messages: newest_first(record.messages),
    }))
}

/// DELETE /api/delete-message/:message_id
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    message_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    let Path(message_id) =
        message_id.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    if !state.store.remove_message(user.id, message_id).await? {
        return Err(AppError::NotFound("Message not found or already deleted"));
    }

    tracing::debug!(username = %user.username, %message_id, "Message deleted");
    Ok(Json(ApiResponse::ok("Message deleted")))
}
