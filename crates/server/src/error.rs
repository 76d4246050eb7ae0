//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Per-field validation errors, present only for `failed_validation`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or unverifiable credentials. Invalid bearer tokens and failed
    /// logins share this variant so the response never reveals which check
    /// failed.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("not permitted: {0}")]
    NotPermitted(String),

    /// A version-stamped update lost the race. The client must re-fetch the
    /// record and retry with the fresh version.
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("the request failed validation")]
    FailedValidation(BTreeMap<String, String>),

    #[error("duplicate record: {0}")]
    DuplicateRecord(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] bindery_metadata::MetadataError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::InvalidCredentials(_) => "invalid_credentials",
            Self::NotPermitted(_) => "not_permitted",
            Self::EditConflict => "edit_conflict",
            Self::FailedValidation(_) => "failed_validation",
            Self::DuplicateRecord(_) => "duplicate_record",
            Self::Internal(_) => "internal_error",
            Self::Metadata(e) => match e {
                bindery_metadata::MetadataError::NotFound(_) => "not_found",
                bindery_metadata::MetadataError::EditConflict(_) => "edit_conflict",
                bindery_metadata::MetadataError::AlreadyExists(_) => "duplicate_record",
                _ => "internal_error",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            Self::NotPermitted(_) => StatusCode::FORBIDDEN,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicateRecord(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Metadata(e) => match e {
                bindery_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                bindery_metadata::MetadataError::EditConflict(_) => StatusCode::CONFLICT,
                bindery_metadata::MetadataError::AlreadyExists(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Edit conflicts from the store surface with the same code and
        // retryable message as the API-level variant.
        let this = if status == StatusCode::CONFLICT {
            ApiError::EditConflict
        } else {
            self
        };

        // 500s carry an opaque body; the cause is logged server-side only.
        let (message, fields) = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %this, "request failed with internal error");
            (
                "the server encountered a problem and could not process your request".to_string(),
                None,
            )
        } else {
            let fields = match &this {
                Self::FailedValidation(fields) => Some(fields.clone()),
                _ => None,
            };
            (this.to_string(), fields)
        };

        let body = ErrorResponse {
            code: this.code().to_string(),
            message,
            fields,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
