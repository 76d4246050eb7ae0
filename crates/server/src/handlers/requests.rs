//! Book purchase request handlers.
//!
//! Requests are not an ownable `ResourceKind`; their status never changes
//! hands, so ownership is checked inline against the row instead of through
//! the cache-backed middleware.

use crate::auth::require_activated;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::format_timestamp;
use crate::state::AppState;
use crate::validation::Validator;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use bindery_core::Principal;
use bindery_metadata::models::RequestRow;
use bindery_metadata::repos::RequestRepo;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 500;
const STATUSES: [&str; 3] = ["pending", "approved", "rejected"];

#[derive(Debug, Deserialize)]
pub struct CreateRequestPayload {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequestPayload {
    pub status: String,
    pub version: i64,
}

#[derive(Debug, Serialize)]
pub struct RequestResponse {
    pub request_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub author: String,
    pub status: String,
    pub created_at: String,
    pub version: i64,
}

impl RequestResponse {
    fn from_row(request: &RequestRow) -> ApiResult<Self> {
        Ok(Self {
            request_id: request.request_id,
            owner_id: request.owner_id,
            title: request.title.clone(),
            author: request.author.clone(),
            status: request.status.clone(),
            created_at: format_timestamp(request.created_at)?,
            version: request.version,
        })
    }
}

fn load_owned_request(request: &RequestRow, user_id: Uuid) -> ApiResult<()> {
    // Hide other users' requests entirely.
    if request.owner_id != user_id {
        return Err(ApiError::NotFound(format!(
            "request {} not found",
            request.request_id
        )));
    }
    Ok(())
}

/// POST /v1/requests - Ask for a book to be added to the catalog.
pub async fn create_request(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateRequestPayload>,
) -> ApiResult<(StatusCode, Json<RequestResponse>)> {
    let account = require_activated(&principal)?;

    let mut v = Validator::new();
    v.check(!payload.title.trim().is_empty(), "title", "must be provided");
    v.check(
        payload.title.len() <= MAX_TITLE_LEN,
        "title",
        "must not be more than 500 bytes long",
    );
    v.check(
        !payload.author.trim().is_empty(),
        "author",
        "must be provided",
    );
    v.finish()?;

    let request = RequestRow {
        request_id: Uuid::new_v4(),
        owner_id: account.user_id,
        title: payload.title,
        author: payload.author,
        status: "pending".to_string(),
        created_at: OffsetDateTime::now_utc(),
        version: 0,
    };
    state.metadata.create_request(&request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RequestResponse::from_row(&request)?),
    ))
}

/// GET /v1/requests/{request_id} - Fetch one of the caller's requests.
pub async fn get_request(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<RequestResponse>> {
    let account = require_activated(&principal)?;

    let request = state
        .metadata
        .get_request(request_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("request {request_id} not found")))?;
    load_owned_request(&request, account.user_id)?;

    Ok(Json(RequestResponse::from_row(&request)?))
}

/// PUT /v1/requests/{request_id} - Update the status of a request.
pub async fn update_request(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<UpdateRequestPayload>,
) -> ApiResult<Json<RequestResponse>> {
    let account = require_activated(&principal)?;

    let mut v = Validator::new();
    v.check(
        STATUSES.contains(&payload.status.as_str()),
        "status",
        "must be one of pending, approved, rejected",
    );
    v.finish()?;

    let mut request = state
        .metadata
        .get_request(request_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("request {request_id} not found")))?;
    load_owned_request(&request, account.user_id)?;

    request.status = payload.status;
    request.version = payload.version;

    let new_version = state.metadata.update_request(&request).await?;
    request.version = new_version;

    Ok(Json(RequestResponse::from_row(&request)?))
}
