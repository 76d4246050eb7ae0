//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::ownership::require_owner;
use crate::ratelimit::rate_limit_middleware;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{MethodRouter, get, post, put};
use bindery_core::ResourceKind;
use tower_http::trace::TraceLayer;

/// Maximum request body size. All bodies are small JSON documents.
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Owner-guarded method router for a mutation on an ownable resource.
fn owned(state: &AppState, kind: ResourceKind, methods: MethodRouter<AppState>) -> MethodRouter<AppState> {
    methods.layer(middleware::from_fn_with_state(
        (state.clone(), kind),
        require_owner,
    ))
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // Health check (intentionally unauthenticated for probes)
        .route("/v1/health", get(handlers::health_check))
        // Account lifecycle
        .route("/v1/users", post(handlers::register_user))
        .route("/v1/users/activated", put(handlers::activate_user))
        .route("/v1/users/password", put(handlers::reset_password))
        // Token issuance
        .route(
            "/v1/tokens/authentication",
            post(handlers::create_authentication_token),
        )
        .route(
            "/v1/tokens/password-reset",
            post(handlers::create_password_reset_token),
        )
        // Books
        .route(
            "/v1/books",
            post(handlers::create_book).get(handlers::list_books),
        )
        .route(
            "/v1/books/{book_id}",
            get(handlers::get_book).merge(owned(
                &state,
                ResourceKind::Book,
                put(handlers::update_book).delete(handlers::delete_book),
            )),
        )
        // Reviews
        .route("/v1/books/{book_id}/reviews", post(handlers::create_review))
        .route(
            "/v1/reviews/{review_id}",
            get(handlers::get_review).merge(owned(
                &state,
                ResourceKind::Review,
                put(handlers::update_review).delete(handlers::delete_review),
            )),
        )
        // Comments
        .route(
            "/v1/reviews/{review_id}/comments",
            post(handlers::create_comment),
        )
        .route(
            "/v1/comments/{comment_id}",
            get(handlers::get_comment).merge(owned(
                &state,
                ResourceKind::Comment,
                put(handlers::update_comment).delete(handlers::delete_comment),
            )),
        )
        // Booklists
        .route("/v1/booklists", post(handlers::create_booklist))
        .route(
            "/v1/booklists/{booklist_id}",
            get(handlers::get_booklist).merge(owned(
                &state,
                ResourceKind::Booklist,
                put(handlers::update_booklist).delete(handlers::delete_booklist),
            )),
        )
        // Purchase requests (ownership enforced in the handlers)
        .route("/v1/requests", post(handlers::create_request))
        .route(
            "/v1/requests/{request_id}",
            get(handlers::get_request).put(handlers::update_request),
        );

    let rate_limit_state = state.rate_limit.clone();

    // Middleware layers apply in reverse order (outermost last).
    // Execution order: TraceLayer -> rate limit -> auth -> handler.
    router
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            rate_limit_state,
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
