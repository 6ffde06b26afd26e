use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelguess::analytics::TracingSink;
use reelguess::provider::{MovieProvider, TmdbConfig, TmdbProvider};
use reelguess::session::AppState;
use reelguess::ws;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelguess=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Guess the Movie...");

    // Initialize the movie provider
    let config = TmdbConfig::from_env();
    let provider: Arc<dyn MovieProvider> = match config.build_provider() {
        Ok(provider) => {
            tracing::info!("TMDb provider initialized");
            Arc::new(provider)
        }
        Err(e) => {
            // Not fatal: fetches fail and the session renders the
            // retry-later message instead.
            tracing::warn!("Failed to initialize TMDb provider: {}. Movie fetches will fail.", e);
            Arc::new(TmdbProvider::from_config(config))
        }
    };

    let state = Arc::new(AppState::new_with_ws_voice(provider, Arc::new(TracingSink)));
    state.start().await;

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // 7177 is ascii for "GM"
    let addr = SocketAddr::from(([0, 0, 0, 0], 7177));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}
