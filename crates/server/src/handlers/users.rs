//! Account lifecycle handlers: registration, activation, password reset.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_timestamp, hash_password};
use crate::notify::Notification;
use crate::state::AppState;
use crate::validation::{Validator, looks_like_email};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use bindery_core::token::hash_plaintext;
use bindery_core::{TOKEN_PLAINTEXT_LEN, Token, TokenScope};
use bindery_metadata::MetadataError;
use bindery_metadata::models::UserRow;
use bindery_metadata::repos::{TokenRepo, UserRepo};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Upper bound on name length, in bytes.
const MAX_NAME_LEN: usize = 500;

/// Password length bounds, in bytes. The upper bound keeps the input inside
/// a single argon2 block-friendly size and matches bcrypt-era conventions.
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 72;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub created_at: String,
    pub name: String,
    pub email: String,
    pub activated: bool,
    pub version: i64,
}

impl UserResponse {
    fn from_row(user: &UserRow) -> ApiResult<Self> {
        Ok(Self {
            user_id: user.user_id,
            created_at: format_timestamp(user.created_at)?,
            name: user.name.clone(),
            email: user.email.clone(),
            activated: user.activated,
            version: user.version,
        })
    }
}

fn validate_password(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= MIN_PASSWORD_LEN,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= MAX_PASSWORD_LEN,
        "password",
        "must not be more than 72 bytes long",
    );
}

fn validate_token_plaintext(v: &mut Validator, token: &str) {
    v.check(!token.is_empty(), "token", "must be provided");
    v.check(
        token.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}

/// POST /v1/users - Register a new account.
///
/// The account starts unactivated; the activation token travels through the
/// notifier, never through the response body.
pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let mut v = Validator::new();
    v.check(!req.name.trim().is_empty(), "name", "must be provided");
    v.check(
        req.name.len() <= MAX_NAME_LEN,
        "name",
        "must not be more than 500 bytes long",
    );
    v.check(!req.email.is_empty(), "email", "must be provided");
    v.check(
        looks_like_email(&req.email),
        "email",
        "must be a valid email address",
    );
    validate_password(&mut v, &req.password);
    v.finish()?;

    let password_hash = hash_password(req.password).await?;
    let user = UserRow {
        user_id: Uuid::new_v4(),
        created_at: OffsetDateTime::now_utc(),
        name: req.name,
        email: req.email,
        password_hash,
        activated: false,
        version: 0,
    };

    match state.metadata.create_user(&user).await {
        Ok(()) => {}
        Err(MetadataError::AlreadyExists(_)) => {
            let mut v = Validator::new();
            v.check(
                false,
                "email",
                "a user with this email address already exists",
            );
            return Err(v.finish().unwrap_err());
        }
        Err(e) => return Err(e.into()),
    }

    let token = Token::generate(
        user.user_id,
        state.config.tokens.activation_ttl(),
        TokenScope::Activation,
    );
    state
        .metadata
        .insert_token(&bindery_metadata::models::TokenRow::from_token(&token))
        .await?;

    state.notifier.enqueue(Notification::Welcome {
        email: user.email.clone(),
        name: user.name.clone(),
        activation_token: token.plaintext,
    });

    Ok((StatusCode::CREATED, Json(UserResponse::from_row(&user)?)))
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub token: String,
}

/// PUT /v1/users/activated - Activate an account with an Activation token.
///
/// Activation is a version-stamped update; winning it revokes every
/// outstanding Activation token for the user, so a replayed token reads as
/// absent.
pub async fn activate_user(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> ApiResult<Json<UserResponse>> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &req.token);
    v.finish()?;

    let token_hash = hash_plaintext(&req.token);
    let mut user = state
        .metadata
        .user_for_token(
            TokenScope::Activation,
            &token_hash,
            OffsetDateTime::now_utc(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("invalid or expired activation token".to_string()))?;

    user.activated = true;
    let new_version = state.metadata.update_user(&user).await?;
    user.version = new_version;

    state
        .metadata
        .delete_tokens_for_user(TokenScope::Activation, user.user_id)
        .await?;

    Ok(Json(UserResponse::from_row(&user)?))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// PUT /v1/users/password - Set a new password with a PasswordReset token.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &req.token);
    validate_password(&mut v, &req.password);
    v.finish()?;

    let token_hash = hash_plaintext(&req.token);
    let mut user = state
        .metadata
        .user_for_token(
            TokenScope::PasswordReset,
            &token_hash,
            OffsetDateTime::now_utc(),
        )
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("invalid or expired password reset token".to_string())
        })?;

    user.password_hash = hash_password(req.password).await?;
    state.metadata.update_user(&user).await?;

    state
        .metadata
        .delete_tokens_for_user(TokenScope::PasswordReset, user.user_id)
        .await?;

    Ok(Json(MessageResponse {
        message: "your password was successfully reset".to_string(),
    }))
}
