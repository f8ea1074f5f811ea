use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Every route here runs behind `auth_middleware`, so handlers always receive a verified
/// `AuthUser`. Ownership checks happen in the lifecycle layer, after body validation.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Account ---
        // PUT /user/auth/update
        // Partial profile update of the caller's own account.
        .route("/user/auth/update", put(handlers::update_profile))
        // DELETE /user/auth/delete
        // Removes the account and all of its posts in one transaction.
        .route("/user/auth/delete", delete(handlers::delete_account))
        // --- Blog ---
        // POST /blog creates a draft (or a published post); PUT /blog patches one.
        .route("/blog", post(handlers::create_post).put(handlers::update_post))
        // PUT /blog/publish
        // Flips a post between draft and published.
        .route("/blog/publish", put(handlers::publish_post))
        // GET/DELETE /blog/{id}
        // Direct lookup (drafts included) and owner-only deletion.
        .route(
            "/blog/{id}",
            get(handlers::get_post).delete(handlers::delete_post),
        )
}
