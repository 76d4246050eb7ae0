//! Book handlers.

use crate::auth::require_activated;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::format_timestamp;
use crate::state::AppState;
use crate::validation::Validator;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use bindery_core::{Principal, ResourceKind};
use bindery_metadata::models::BookRow;
use bindery_metadata::repos::BookRepo;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 500;
const MIN_YEAR: i64 = 1450;
const MAX_GENRES: usize = 5;

#[derive(Debug, Deserialize)]
pub struct BookPayload {
    pub title: String,
    pub author: String,
    pub year: i64,
    pub pages: i64,
    pub genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookRequest {
    #[serde(flatten)]
    pub book: BookPayload,
    /// The version the client last read; the update succeeds only if it is
    /// still current.
    pub version: i64,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub book_id: Uuid,
    pub created_at: String,
    pub owner_id: Uuid,
    pub title: String,
    pub author: String,
    pub year: i64,
    pub pages: i64,
    pub genres: Vec<String>,
    pub version: i64,
}

impl BookResponse {
    fn from_row(book: &BookRow) -> ApiResult<Self> {
        let genres: Vec<String> = serde_json::from_str(&book.genres).unwrap_or_else(|e| {
            tracing::warn!(book_id = %book.book_id, error = %e, "stored genres are not valid JSON");
            Vec::new()
        });
        Ok(Self {
            book_id: book.book_id,
            created_at: format_timestamp(book.created_at)?,
            owner_id: book.owner_id,
            title: book.title.clone(),
            author: book.author.clone(),
            year: book.year,
            pages: book.pages,
            genres,
            version: book.version,
        })
    }
}

fn validate_payload(payload: &BookPayload) -> ApiResult<()> {
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
    v.check(payload.year >= MIN_YEAR, "year", "must be after 1450");
    let current_year = i64::from(OffsetDateTime::now_utc().year());
    v.check(
        payload.year <= current_year,
        "year",
        "must not be in the future",
    );
    v.check(payload.pages > 0, "pages", "must be a positive integer");
    v.check(!payload.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        payload.genres.len() <= MAX_GENRES,
        "genres",
        "must not contain more than 5 genres",
    );
    let unique: HashSet<&String> = payload.genres.iter().collect();
    v.check(
        unique.len() == payload.genres.len(),
        "genres",
        "must not contain duplicate values",
    );
    v.finish()
}

fn encode_genres(genres: &[String]) -> ApiResult<String> {
    serde_json::to_string(genres)
        .map_err(|e| ApiError::Internal(format!("failed to encode genres: {e}")))
}

/// POST /v1/books - Create a book owned by the caller.
pub async fn create_book(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<BookPayload>,
) -> ApiResult<(StatusCode, Json<BookResponse>)> {
    let account = require_activated(&principal)?;
    validate_payload(&payload)?;

    let book = BookRow {
        book_id: Uuid::new_v4(),
        created_at: OffsetDateTime::now_utc(),
        owner_id: account.user_id,
        title: payload.title,
        author: payload.author,
        year: payload.year,
        pages: payload.pages,
        genres: encode_genres(&payload.genres)?,
        version: 0,
    };
    state.metadata.create_book(&book).await?;

    // Write-through: the creator is the owner, no point resolving it later.
    state
        .ownership
        .insert(ResourceKind::Book, book.book_id, book.owner_id);

    Ok((StatusCode::CREATED, Json(BookResponse::from_row(&book)?)))
}

/// GET /v1/books - List all books, newest first.
pub async fn list_books(State(state): State<AppState>) -> ApiResult<Json<Vec<BookResponse>>> {
    let books = state.metadata.list_books().await?;
    let responses = books
        .iter()
        .map(BookResponse::from_row)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(responses))
}

/// GET /v1/books/{book_id} - Fetch a single book.
pub async fn get_book(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<BookResponse>> {
    let book = state
        .metadata
        .get_book(book_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("book {book_id} not found")))?;
    Ok(Json(BookResponse::from_row(&book)?))
}

/// PUT /v1/books/{book_id} - Replace the mutable fields of a book.
///
/// Ownership is enforced by middleware; this handler enforces the version
/// check. A stale version is a 409 and the client must re-fetch.
pub async fn update_book(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> ApiResult<Json<BookResponse>> {
    validate_payload(&req.book)?;

    let mut book = state
        .metadata
        .get_book(book_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("book {book_id} not found")))?;

    book.title = req.book.title;
    book.author = req.book.author;
    book.year = req.book.year;
    book.pages = req.book.pages;
    book.genres = encode_genres(&req.book.genres)?;
    book.version = req.version;

    let new_version = state.metadata.update_book(&book).await?;
    book.version = new_version;

    Ok(Json(BookResponse::from_row(&book)?))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

/// DELETE /v1/books/{book_id} - Delete a book.
pub async fn delete_book(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    state.metadata.delete_book(book_id).await?;
    state.ownership.invalidate(ResourceKind::Book, book_id);

    Ok(Json(DeletedResponse {
        message: "book successfully deleted".to_string(),
    }))
}
