pub mod auth;
pub mod messages;
pub mod preferences;
pub mod usernames;

use axum::{extract::rejection::JsonRejection, Json};

use crate::error::AppError;

/// Unwrap a JSON body, turning malformed or mistyped input into a 400 with
/// the usual `{success, message}` shape instead of axum's plain-text reply.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}
