//! Token issuance handlers.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_timestamp, verify_password};
use crate::notify::Notification;
use crate::state::AppState;
use crate::validation::{Validator, looks_like_email};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use bindery_core::{Token, TokenScope};
use bindery_metadata::models::TokenRow;
use bindery_metadata::repos::{TokenRepo, UserRepo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// The token plaintext, shown exactly once.
    pub token: String,
    pub expires_at: String,
}

/// POST /v1/tokens/authentication - Exchange credentials for a bearer token.
///
/// Unknown email and wrong password answer identically so the endpoint
/// cannot be used to probe for accounts.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let mut v = Validator::new();
    v.check(!req.email.is_empty(), "email", "must be provided");
    v.check(
        looks_like_email(&req.email),
        "email",
        "must be a valid email address",
    );
    v.check(!req.password.is_empty(), "password", "must be provided");
    v.finish()?;

    let invalid = || ApiError::InvalidCredentials("invalid authentication credentials".to_string());

    let user = state
        .metadata
        .get_user_by_email(&req.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let token = Token::generate(
        user.user_id,
        state.config.tokens.authentication_ttl(),
        TokenScope::Authentication,
    );
    state
        .metadata
        .insert_token(&TokenRow::from_token(&token))
        .await?;

    let expires_at = format_timestamp(token.expires_at)?;
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token: token.plaintext,
            expires_at,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetTokenRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub message: String,
}

/// POST /v1/tokens/password-reset - Issue a password reset token.
///
/// The token travels through the notifier; the response only acknowledges
/// the request.
pub async fn create_password_reset_token(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetTokenRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let mut v = Validator::new();
    v.check(!req.email.is_empty(), "email", "must be provided");
    v.check(
        looks_like_email(&req.email),
        "email",
        "must be a valid email address",
    );
    v.finish()?;

    let user = state
        .metadata
        .get_user_by_email(&req.email)
        .await?
        .ok_or_else(|| {
            let mut v = Validator::new();
            v.check(false, "email", "no matching email address found");
            v.finish().unwrap_err()
        })?;

    if !user.activated {
        return Err(ApiError::NotPermitted(
            "your user account must be activated to reset the password".to_string(),
        ));
    }

    let token = Token::generate(
        user.user_id,
        state.config.tokens.password_reset_ttl(),
        TokenScope::PasswordReset,
    );
    state
        .metadata
        .insert_token(&TokenRow::from_token(&token))
        .await?;

    state.notifier.enqueue(Notification::PasswordReset {
        email: user.email,
        reset_token: token.plaintext,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            message: "an email will be sent to you containing password reset instructions"
                .to_string(),
        }),
    ))
}
