use crate::catalog::TmdbCatalog;
use crate::classifier::OpenAiClassifier;
use crate::config::Config;
use crate::handlers::{self, AppState};
use crate::middleware::logging_middleware;
use crate::quota_store::QuotaStore;
use crate::rate_limiter::RateLimiter;
use crate::reclaimer::Reclaimer;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct Server {
    app: Router,
    bind_address: SocketAddr,
    reclaimer: Reclaimer,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(QuotaStore::new());
        let limiter = RateLimiter::new(store.clone(), config.daily_limit, config.window());
        let reclaimer = Reclaimer::spawn(store, config.sweep_interval());

        let client = reqwest::Client::new();
        let state = AppState {
            limiter,
            classifier: Arc::new(OpenAiClassifier::new(
                client.clone(),
                config.classifier_base_url,
                config.classifier_api_key,
                config.classifier_model,
            )),
            catalog: Arc::new(TmdbCatalog::new(
                client,
                config.tmdb_base_url,
                config.tmdb_api_key,
            )),
        };

        Self {
            app: build_router(state),
            bind_address: config.bind_address,
            reclaimer,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_address).await?;

        tracing::info!("Discovery relay listening on {}", self.bind_address);
        tracing::info!("Quota status available at /api/quota");
        tracing::info!("Health check available at /health");

        // Run server with graceful shutdown
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        self.reclaimer.shutdown();
        Ok(())
    }
}

/// Builds the application router. Exposed so tests can drive the full
/// HTTP surface with injected collaborators.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/discover", post(handlers::discover))
        .route("/api/quota", get(handlers::quota_status))
        .route("/health", get(handlers::health_check))
        .with_state(Arc::new(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
