//! Comment handlers.

use crate::auth::require_activated;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::format_timestamp;
use crate::state::AppState;
use crate::validation::Validator;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use bindery_core::{Principal, ResourceKind};
use bindery_metadata::models::CommentRow;
use bindery_metadata::repos::{CommentRepo, ReviewRepo};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_BODY_LEN: usize = 2_000;

#[derive(Debug, Deserialize)]
pub struct CommentPayload {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub body: String,
    pub version: i64,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment_id: Uuid,
    pub review_id: Uuid,
    pub owner_id: Uuid,
    pub body: String,
    pub created_at: String,
    pub version: i64,
}

impl CommentResponse {
    fn from_row(comment: &CommentRow) -> ApiResult<Self> {
        Ok(Self {
            comment_id: comment.comment_id,
            review_id: comment.review_id,
            owner_id: comment.owner_id,
            body: comment.body.clone(),
            created_at: format_timestamp(comment.created_at)?,
            version: comment.version,
        })
    }
}

fn validate_body(body: &str) -> ApiResult<()> {
    let mut v = Validator::new();
    v.check(!body.trim().is_empty(), "body", "must be provided");
    v.check(
        body.len() <= MAX_BODY_LEN,
        "body",
        "must not be more than 2000 bytes long",
    );
    v.finish()
}

/// POST /v1/reviews/{review_id}/comments - Comment on a review.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(review_id): Path<Uuid>,
    Json(payload): Json<CommentPayload>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let account = require_activated(&principal)?;
    validate_body(&payload.body)?;

    state
        .metadata
        .get_review(review_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("review {review_id} not found")))?;

    let comment = CommentRow {
        comment_id: Uuid::new_v4(),
        review_id,
        owner_id: account.user_id,
        body: payload.body,
        created_at: OffsetDateTime::now_utc(),
        version: 0,
    };
    state.metadata.create_comment(&comment).await?;
    state
        .ownership
        .insert(ResourceKind::Comment, comment.comment_id, comment.owner_id);

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::from_row(&comment)?),
    ))
}

/// GET /v1/comments/{comment_id} - Fetch a comment.
pub async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = state
        .metadata
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("comment {comment_id} not found")))?;
    Ok(Json(CommentResponse::from_row(&comment)?))
}

/// PUT /v1/comments/{comment_id} - Update the comment body.
pub async fn update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Json(req): Json<UpdateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    validate_body(&req.body)?;

    let mut comment = state
        .metadata
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("comment {comment_id} not found")))?;

    comment.body = req.body;
    comment.version = req.version;

    let new_version = state.metadata.update_comment(&comment).await?;
    comment.version = new_version;

    Ok(Json(CommentResponse::from_row(&comment)?))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

/// DELETE /v1/comments/{comment_id} - Delete a comment.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    state.metadata.delete_comment(comment_id).await?;
    state.ownership.invalidate(ResourceKind::Comment, comment_id);

    Ok(Json(DeletedResponse {
        message: "comment successfully deleted".to_string(),
    }))
}
