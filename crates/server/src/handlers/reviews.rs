//! Review handlers.

use crate::auth::require_activated;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::format_timestamp;
use crate::state::AppState;
use crate::validation::Validator;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use bindery_core::{Principal, ResourceKind};
use bindery_metadata::models::ReviewRow;
use bindery_metadata::repos::{BookRepo, ReviewRepo};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_BODY_LEN: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct ReviewPayload {
    pub rating: i64,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    #[serde(flatten)]
    pub review: ReviewPayload,
    pub version: i64,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub review_id: Uuid,
    pub book_id: Uuid,
    pub owner_id: Uuid,
    pub rating: i64,
    pub body: String,
    pub created_at: String,
    pub version: i64,
}

impl ReviewResponse {
    fn from_row(review: &ReviewRow) -> ApiResult<Self> {
        Ok(Self {
            review_id: review.review_id,
            book_id: review.book_id,
            owner_id: review.owner_id,
            rating: review.rating,
            body: review.body.clone(),
            created_at: format_timestamp(review.created_at)?,
            version: review.version,
        })
    }
}

fn validate_payload(payload: &ReviewPayload) -> ApiResult<()> {
    let mut v = Validator::new();
    v.check(
        (1..=5).contains(&payload.rating),
        "rating",
        "must be between 1 and 5",
    );
    v.check(!payload.body.trim().is_empty(), "body", "must be provided");
    v.check(
        payload.body.len() <= MAX_BODY_LEN,
        "body",
        "must not be more than 10000 bytes long",
    );
    v.finish()
}

/// POST /v1/books/{book_id}/reviews - Review a book.
pub async fn create_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<ReviewPayload>,
) -> ApiResult<(StatusCode, Json<ReviewResponse>)> {
    let account = require_activated(&principal)?;
    validate_payload(&payload)?;

    // The review must hang off an existing book.
    state
        .metadata
        .get_book(book_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("book {book_id} not found")))?;

    let review = ReviewRow {
        review_id: Uuid::new_v4(),
        book_id,
        owner_id: account.user_id,
        rating: payload.rating,
        body: payload.body,
        created_at: OffsetDateTime::now_utc(),
        version: 0,
    };
    state.metadata.create_review(&review).await?;
    state
        .ownership
        .insert(ResourceKind::Review, review.review_id, review.owner_id);

    Ok((StatusCode::CREATED, Json(ReviewResponse::from_row(&review)?)))
}

/// GET /v1/reviews/{review_id} - Fetch a review.
pub async fn get_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> ApiResult<Json<ReviewResponse>> {
    let review = state
        .metadata
        .get_review(review_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("review {review_id} not found")))?;
    Ok(Json(ReviewResponse::from_row(&review)?))
}

/// PUT /v1/reviews/{review_id} - Update rating and body.
pub async fn update_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
    Json(req): Json<UpdateReviewRequest>,
) -> ApiResult<Json<ReviewResponse>> {
    validate_payload(&req.review)?;

    let mut review = state
        .metadata
        .get_review(review_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("review {review_id} not found")))?;

    review.rating = req.review.rating;
    review.body = req.review.body;
    review.version = req.version;

    let new_version = state.metadata.update_review(&review).await?;
    review.version = new_version;

    Ok(Json(ReviewResponse::from_row(&review)?))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

/// DELETE /v1/reviews/{review_id} - Delete a review.
pub async fn delete_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    state.metadata.delete_review(review_id).await?;
    state.ownership.invalidate(ResourceKind::Review, review_id);

    Ok(Json(DeletedResponse {
        message: "review successfully deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating_bounds() {
        for rating in [1, 3, 5] {
            let payload = ReviewPayload {
                rating,
                body: "a fine read".to_string(),
            };
            assert!(validate_payload(&payload).is_ok());
        }
        for rating in [0, 6, -1] {
            let payload = ReviewPayload {
                rating,
                body: "a fine read".to_string(),
            };
            assert!(validate_payload(&payload).is_err());
        }
    }

    #[test]
    fn test_validate_body_required() {
        let payload = ReviewPayload {
            rating: 4,
            body: "  ".to_string(),
        };
        assert!(validate_payload(&payload).is_err());
    }
}
