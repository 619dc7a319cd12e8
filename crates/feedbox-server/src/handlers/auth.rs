use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use feedbox_shared::api::{ApiResponse, SignInRequest, SignInResponse, SignUpRequest, VerifyCodeRequest};
use rand::Rng;

use crate::auth::{create_access_token, hash_password, verify_password};
use crate::db::{Registration, UserRecord};
use crate::error::AppError;
use crate::handlers::json_body;
use crate::routes::AppState;
use crate::validation::{validate_email, validate_password, validate_username};

/// Six-digit numeric code, never starting with zero.
fn generate_verify_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// POST /api/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    body: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse>), AppError> {
    let req = json_body(body)?;

    validate_username(&req.username)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    if state
        .store
        .find_verified_by_username(&req.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username is already taken".to_string()));
    }

    let existing = state.store.find_by_email(&req.email).await?;
    if existing.as_ref().is_some_and(|user| user.is_verified) {
        return Err(AppError::Conflict(
            "User already exists with this email".to_string(),
        ));
    }

    // Hash only once a write is certain
    let verify_code = generate_verify_code();
    let verify_code_expiry = Utc::now() + Duration::seconds(state.config.verify_code_ttl_secs);
    let password_hash = hash_password(&req.password)?;

    match existing {
        // Unverified account signing up again: fresh credentials and code
        Some(existing) => {
            let registration = Registration {
                username: req.username.clone(),
                password_hash,
                verify_code: verify_code.clone(),
                verify_code_expiry,
            };
            state
                .store
                .update_registration(existing.id, &registration)
                .await?;
            tracing::debug!(user_id = %existing.id, "Refreshed pending registration");
        }
        None => {
            let user = UserRecord::new(
                &req.username,
                &req.email,
                password_hash,
                verify_code.clone(),
                verify_code_expiry,
            );
            state.store.insert_user(&user).await?;
            tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        }
    }

    state
        .mailer
        .send_verification(&req.email, &req.username, &verify_code)
        .await
        .map_err(AppError::Mail)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "User registered successfully. Please verify your account.",
        )),
    ))
}

/// POST /api/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    body: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<SignInResponse>, AppError> {
    let req = json_body(body)?;

    let user = match state.store.find_by_email(&req.identifier).await? {
        Some(user) => Some(user),
        None => state.store.find_by_username(&req.identifier).await?,
    };
    let user = user.ok_or(AppError::Unauthorized)?;

    if !user.is_verified {
        return Err(AppError::EmailNotVerified);
    }

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = create_access_token(
        user.id,
        &user.username,
        &state.config.jwt_secret,
        state.config.jwt_expires_in,
    )?;

    Ok(Json(SignInResponse {
        success: true,
        message: "Signed in".to_string(),
        token,
    }))
}

/// POST /api/verify-code
pub async fn verify_code(
    State(state): State<AppState>,
    body: Result<Json<VerifyCodeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, AppError> {
    let req = json_body(body)?;

    // Usernames may arrive percent-encoded from the verify page URL
    let username = urlencoding::decode(&req.username)
        .map_err(|_| AppError::Validation("Username is not valid UTF-8".to_string()))?;

    // Several pending sign-ups may share a username; the code picks the one
    let user = match state
        .store
        .find_pending_by_username_and_code(&username, &req.code)
        .await?
    {
        Some(user) => user,
        None => state
            .store
            .find_by_username(&username)
            .await?
            .ok_or(AppError::NotFound("User not found"))?,
    };

    if let Err(e) = user.check_verify_code(&req.code, Utc::now()) {
        tracing::debug!(user_id = %user.id, "Verification rejected: {}", e);
        return Err(e);
    }

    // Another pending registrant may have claimed the name first
    if let Some(owner) = state.store.find_verified_by_username(&username).await? {
        if owner.id != user.id {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }
    }

    if !state.store.mark_verified(user.id).await? {
        return Err(AppError::NotFound("User not found"));
    }

    tracing::info!(user_id = %user.id, "Account verified");
    Ok(Json(ApiResponse::ok("Account verified successfully")))
}
