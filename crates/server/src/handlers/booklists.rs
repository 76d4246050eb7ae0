//! Reading list handlers.

use crate::auth::require_activated;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::format_timestamp;
use crate::state::AppState;
use crate::validation::Validator;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use bindery_core::{Principal, ResourceKind};
use bindery_metadata::models::BooklistRow;
use bindery_metadata::repos::BooklistRepo;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct BooklistPayload {
    pub name: String,
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBooklistRequest {
    #[serde(flatten)]
    pub booklist: BooklistPayload,
    pub version: i64,
}

#[derive(Debug, Serialize)]
pub struct BooklistResponse {
    pub booklist_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub is_public: bool,
    pub created_at: String,
    pub version: i64,
}

impl BooklistResponse {
    fn from_row(booklist: &BooklistRow) -> ApiResult<Self> {
        Ok(Self {
            booklist_id: booklist.booklist_id,
            owner_id: booklist.owner_id,
            name: booklist.name.clone(),
            is_public: booklist.is_public,
            created_at: format_timestamp(booklist.created_at)?,
            version: booklist.version,
        })
    }
}

fn validate_payload(payload: &BooklistPayload) -> ApiResult<()> {
    let mut v = Validator::new();
    v.check(!payload.name.trim().is_empty(), "name", "must be provided");
    v.check(
        payload.name.len() <= MAX_NAME_LEN,
        "name",
        "must not be more than 200 bytes long",
    );
    v.finish()
}

/// POST /v1/booklists - Create a reading list.
pub async fn create_booklist(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<BooklistPayload>,
) -> ApiResult<(StatusCode, Json<BooklistResponse>)> {
    let account = require_activated(&principal)?;
    validate_payload(&payload)?;

    let booklist = BooklistRow {
        booklist_id: Uuid::new_v4(),
        owner_id: account.user_id,
        name: payload.name,
        is_public: payload.is_public,
        created_at: OffsetDateTime::now_utc(),
        version: 0,
    };
    state.metadata.create_booklist(&booklist).await?;
    state.ownership.insert(
        ResourceKind::Booklist,
        booklist.booklist_id,
        booklist.owner_id,
    );

    Ok((
        StatusCode::CREATED,
        Json(BooklistResponse::from_row(&booklist)?),
    ))
}

/// GET /v1/booklists/{booklist_id} - Fetch a reading list.
///
/// Private lists are visible only to their owner; everyone else sees the
/// same 404 as for a list that does not exist.
pub async fn get_booklist(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booklist_id): Path<Uuid>,
) -> ApiResult<Json<BooklistResponse>> {
    let booklist = state
        .metadata
        .get_booklist(booklist_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("booklist {booklist_id} not found")))?;

    if !booklist.is_public && principal.user_id() != Some(booklist.owner_id) {
        return Err(ApiError::NotFound(format!(
            "booklist {booklist_id} not found"
        )));
    }

    Ok(Json(BooklistResponse::from_row(&booklist)?))
}

/// PUT /v1/booklists/{booklist_id} - Update name and visibility.
pub async fn update_booklist(
    State(state): State<AppState>,
    Path(booklist_id): Path<Uuid>,
    Json(req): Json<UpdateBooklistRequest>,
) -> ApiResult<Json<BooklistResponse>> {
    validate_payload(&req.booklist)?;

    let mut booklist = state
        .metadata
        .get_booklist(booklist_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("booklist {booklist_id} not found")))?;

    booklist.name = req.booklist.name;
    booklist.is_public = req.booklist.is_public;
    booklist.version = req.version;

    let new_version = state.metadata.update_booklist(&booklist).await?;
    booklist.version = new_version;

    Ok(Json(BooklistResponse::from_row(&booklist)?))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

/// DELETE /v1/booklists/{booklist_id} - Delete a reading list.
pub async fn delete_booklist(
    State(state): State<AppState>,
    Path(booklist_id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    state.metadata.delete_booklist(booklist_id).await?;
    state
        .ownership
        .invalidate(ResourceKind::Booklist, booklist_id);

    Ok(Json(DeletedResponse {
        message: "booklist successfully deleted".to_string(),
    }))
}
