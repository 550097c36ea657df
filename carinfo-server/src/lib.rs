//! CarInfo HTTP Server - policy-gated CRUD API over the car inventory
//!
//! Routes:
//!
//! ```text
//! GET    /cars              list all cars
//! POST   /cars              create a car, returns its identifier
//! GET    /cars/:id          fetch a car
//! PUT    /cars/:id          create or replace a car
//! DELETE /cars/:id          delete a car and its status
//! GET    /cars/:id/status   fetch a car's status
//! PUT    /cars/:id/status   create or replace a car's status
//! ```

pub mod api;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod telemetry;

pub use api::{HealthResponse, MessageResponse};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use anyhow::Context;
use axum::{middleware, routing::get, Router};
use carinfo_core::Config;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

/// Build the application router over `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/cars", get(handlers::list_cars).post(handlers::create_car))
        .route(
            "/cars/:id",
            get(handlers::get_car)
                .put(handlers::put_car)
                .delete(handlers::delete_car),
        )
        .route(
            "/cars/:id/status",
            get(handlers::get_status).put(handlers::put_status),
        )
        // Health checks
        .route("/health/live", get(handlers::health_live))
        // Metrics
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(middleware::from_fn(handlers::track_requests)),
        )
}

/// Run the server described by `config` until ctrl-c
pub async fn serve(config: Config) -> anyhow::Result<()> {
    metrics::init_prometheus()?;

    let state = AppState::from_config(&config).context("Invalid configuration")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, shutting down gracefully..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
