//! Authentication middleware and request identity plumbing.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, VARY};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bindery_core::token::hash_plaintext;
use bindery_core::{AuthenticatedAccount, Principal, TOKEN_PLAINTEXT_LEN, TokenScope};
use bindery_metadata::repos::TokenRepo;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, truncated by character
    /// count (not bytes, to stay on UTF-8 boundaries) and filtered to
    /// printable ASCII.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Outcome of parsing the Authorization header.
enum BearerHeader {
    /// No Authorization header, or a non-Bearer scheme. An anonymous request.
    Absent,
    /// A Bearer header whose value still needs store validation.
    Token(String),
    /// A Bearer header that cannot possibly be one of our tokens.
    Malformed,
}

/// Parse the Authorization header. Per RFC 6750 the scheme is
/// case-insensitive. A present-but-broken Bearer header is distinguished from
/// an absent one: the former is an authentication failure, never anonymous.
fn parse_bearer_header(headers: &axum::http::HeaderMap) -> BearerHeader {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return BearerHeader::Absent;
    };
    let Ok(value) = value.to_str() else {
        return BearerHeader::Malformed;
    };

    let mut parts = value.splitn(2, ' ');
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("bearer") {
        // A different scheme (e.g. Basic) is not ours to reject.
        return BearerHeader::Absent;
    }

    match parts.next() {
        // Length and embedded whitespace are checked before hashing so
        // garbage never reaches the store.
        Some(token)
            if token.len() == TOKEN_PLAINTEXT_LEN && !token.contains(char::is_whitespace) =>
        {
            BearerHeader::Token(token.to_string())
        }
        _ => BearerHeader::Malformed,
    }
}

/// Resolve the request principal from the Authorization header.
///
/// No header yields `Principal::Anonymous`; a Bearer header must validate
/// against an unexpired Authentication-scoped token or the request fails.
async fn resolve_principal(
    state: &AppState,
    headers: &axum::http::HeaderMap,
) -> ApiResult<Principal> {
    let token = match parse_bearer_header(headers) {
        BearerHeader::Absent => return Ok(Principal::Anonymous),
        BearerHeader::Malformed => {
            return Err(ApiError::InvalidCredentials(
                "invalid or missing authentication token".to_string(),
            ));
        }
        BearerHeader::Token(token) => token,
    };

    let token_hash = hash_plaintext(&token);
    let user = state
        .metadata
        .user_for_token(
            TokenScope::Authentication,
            &token_hash,
            OffsetDateTime::now_utc(),
        )
        .await?
        .ok_or_else(|| {
            ApiError::InvalidCredentials("invalid or missing authentication token".to_string())
        })?;

    Ok(Principal::User(AuthenticatedAccount {
        user_id: user.user_id,
        name: user.name,
        email: user.email,
        activated: user.activated,
    }))
}

/// Authentication middleware.
///
/// Resolves the principal for every request and stores it in request
/// extensions; downstream guards branch on it without touching the store
/// again. Responses always carry `Vary: Authorization` because the same URL
/// renders differently per caller.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    // Rejections are rendered here rather than propagated so that every
    // response, including a 401, carries the Vary header.
    let mut response = match resolve_principal(&state, req.headers()).await {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req)
                .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
                .await
        }
        Err(err) => err.into_response(),
    };

    response
        .headers_mut()
        .append(VARY, HeaderValue::from_static("Authorization"));

    response
}

/// Require an authenticated caller.
pub fn require_authenticated(principal: &Principal) -> ApiResult<&AuthenticatedAccount> {
    principal.account().ok_or_else(|| {
        ApiError::InvalidCredentials("you must be authenticated to access this resource".to_string())
    })
}

/// Require an authenticated, activated caller.
pub fn require_activated(principal: &Principal) -> ApiResult<&AuthenticatedAccount> {
    let account = require_authenticated(principal)?;
    if !account.activated {
        return Err(ApiError::NotPermitted(
            "your user account must be activated to access this resource".to_string(),
        ));
    }
    Ok(account)
}
