use inkpost::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    memory::InMemoryRepository,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{process, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point for the application, responsible for initializing
/// all core components: Configuration, Logging, the Store, and the HTTP Server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    // Logging is not up yet, so a configuration error goes straight to stderr.
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e}");
            process::exit(1);
        }
    };

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "inkpost=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability during local debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(config = ?config, "Application starting in {:?} mode", config.env);

    // 4. Store Initialization
    // Postgres when a connection string is configured, the in-memory store otherwise
    // (only reachable in local mode; production refuses to load without DATABASE_URL).
    let repo: RepositoryState = match config.db_url.as_deref() {
        Some(db_url) => {
            let pool = match PgPoolOptions::new().max_connections(5).connect(db_url).await {
                Ok(pool) => pool,
                Err(e) => {
                    tracing::error!(error = %e, "FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
                    process::exit(1);
                }
            };

            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                tracing::error!(error = %e, "FATAL: Failed to apply database migrations.");
                process::exit(1);
            }

            Arc::new(PostgresRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 5. Unified State Assembly and Router
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(repo, config));

    // 6. Server Startup
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %bind_addr, "FATAL: Failed to bind listener.");
            process::exit(1);
        }
    };

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "HTTP server terminated");
        process::exit(1);
    }
}
