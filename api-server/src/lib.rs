//! HTTP surface for MarketSnipe.
//!
//! Two groups of routes share one Axum router:
//!
//! - `/functions/v1/*`: the keyword, LLM, scraping and post lookup functions
//!   the web app calls directly.
//! - `/api/*`: the paced Reddit metadata proxy plus the project and
//!   saved-comment records.
//!
//! `GET /health` reports the queue and upstream counters.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::http::{header, HeaderName};
use axum::routing::{get, post};
use axum::Router;
use marketsnipe_core::AppConfig;
use routes::{functions, health, proxy, records};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Builds the router with every route, CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route(
            "/functions/v1/generate-keywords",
            post(functions::generate_keywords),
        )
        .route(
            "/functions/v1/openrouter-call",
            post(functions::openrouter_call),
        )
        .route(
            "/functions/v1/yellowcake-scrape",
            post(functions::yellowcake_scrape),
        )
        .route(
            "/functions/v1/yellowcake-post-comments",
            post(functions::yellowcake_post_comments),
        )
        .route(
            "/functions/v1/fetch-reddit-post",
            post(functions::fetch_reddit_post),
        )
        .route("/api/reddit-meta", post(proxy::reddit_meta))
        .route(
            "/api/projects",
            get(records::list_projects).post(records::create_project),
        )
        .route(
            "/api/saved-comments",
            get(records::list_saved_comments).post(records::save_comment),
        )
        .route("/health", get(health::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the application state and serves until Ctrl-C.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::build(config).await?;
    let database = state.database.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("MarketSnipe server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    database.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
