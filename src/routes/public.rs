use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that never require a token. None of them mutates existing content.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /user/signup
        // Creates an account and returns its first session token.
        .route("/user/signup", post(handlers::signup))
        // POST /user/signin
        // Exchanges credentials for a session token.
        .route("/user/signin", post(handlers::signin))
        // POST /user/userinfo
        // Public profile plus post count for the account id in the body.
        .route("/user/userinfo", post(handlers::get_profile))
}

/// Listing Router Module
///
/// Bulk and author-scoped listings. `create_router` wraps these either in the auth gate
/// (`gate_read_routes = true`) or in the soft identification layer, which binds an identity
/// when a valid token happens to be present so authors can see their own drafts.
pub fn listing_routes() -> Router<AppState> {
    Router::new()
        // GET /blog/bulk
        // Every published post with its author summary.
        .route("/blog/bulk", get(handlers::list_posts))
        // GET /blog/author/{id}
        // Posts by one author; drafts only for the author themselves.
        .route("/blog/author/{id}", get(handlers::list_author_posts))
}
