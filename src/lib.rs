use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod password;
pub mod repository;
pub mod validation;

// Module for routing segregation (Public/Listing, Authenticated).
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::{AuthUser, TokenService};
pub use config::AppConfig;
pub use error::ApiError;
pub use memory::InMemoryRepository;
pub use password::PasswordHasher;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler and wire schema, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::signup, handlers::signin, handlers::get_profile, handlers::update_profile,
        handlers::delete_account, handlers::create_post, handlers::update_post,
        handlers::publish_post, handlers::list_posts, handlers::get_post,
        handlers::list_author_posts, handlers::delete_post
    ),
    components(
        schemas(
            models::Post, models::PostView, models::AuthorSummary, models::ProfileView,
            models::SignupRequest, models::SigninRequest, models::ProfileLookupRequest,
            models::UpdateProfileRequest, models::DeleteAccountRequest,
            models::CreatePostRequest, models::UpdatePostRequest, models::PublishRequest,
            models::MessageResponse, models::TokenResponse, models::PostIdResponse,
            models::PostResponse, models::PostListResponse, models::ProfileResponse,
            models::AccountDeletedResponse,
        )
    ),
    tags(
        (name = "inkpost", description = "Blog publishing API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of everything a request needs: the store, the token
/// and password services, and the immutable configuration they were built from.
#[derive(Clone)]
pub struct AppState {
    /// Credential and content store (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Issues and verifies bearer tokens with the configured secret.
    pub tokens: TokenService,
    pub hasher: PasswordHasher,
    pub config: AppConfig,
}

impl AppState {
    /// Derives the token and password services from `config`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            repo,
            tokens: TokenService::from_config(&config),
            hasher: PasswordHasher::new(config.bcrypt_cost),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// The gate middlewares only need the token service, not the whole state.
impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

/// auth_middleware
///
/// The auth gate. Reads `Authorization: Bearer <token>`, verifies it and binds the
/// resulting `AuthUser` into the request extensions. Any failure short-circuits with
/// 401 (bad/missing/expired token) or 403 (verified token without identity), and the
/// handler never runs.
async fn auth_middleware(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = auth::bearer_token(request.headers()).and_then(|token| tokens.authenticate(token))?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// identify_middleware
///
/// Soft variant of the gate for ungated listings: binds an identity when a valid token is
/// present and otherwise lets the request through anonymously.
async fn identify_middleware(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = auth::bearer_token(request.headers())
        .and_then(|token| tokens.authenticate(token))
        .ok();
    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure under `/api/v1`, applies the gate per router and the
/// observability layers globally, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Listing policy: gated in hardened mode, soft identification otherwise.
    let listings = if state.config.gate_read_routes {
        public::listing_routes()
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
    } else {
        public::listing_routes()
            .route_layer(middleware::from_fn_with_state(state.clone(), identify_middleware))
    };

    // 3. Versioned API
    let api = Router::new()
        .merge(public::public_routes())
        .merge(listings)
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        .nest("/api/v1", api)
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for each request carrying method, URI and the `x-request-id`, so every log line of
/// one request can be correlated. The Authorization header is never recorded.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
