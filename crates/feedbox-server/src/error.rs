use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use feedbox_shared::api::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Please verify your account before logging in")]
    EmailNotVerified,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Verification code has expired. Please sign up again to get a new code")]
    CodeExpired,

    #[error("Incorrect verification code")]
    InvalidCode,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Failed to send verification email: {0}")]
    Mail(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::EmailNotVerified => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CodeExpired
            | AppError::InvalidCode
            | AppError::Validation(_)
            | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Mail(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Mail(e) => {
                tracing::error!("Verification email failed: {:?}", e);
                "Failed to send verification email".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "Internal error".to_string()
            }
            _ => self.to_string(),
        };

        (self.status(), Json(ApiResponse::error(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound("User not found").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden("nope").status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::CodeExpired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn expired_and_invalid_codes_are_distinguishable() {
        assert_ne!(AppError::CodeExpired.to_string(), AppError::InvalidCode.to_string());
    }
}
