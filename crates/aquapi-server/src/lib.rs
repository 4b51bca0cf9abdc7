pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health))
        // Actuators
        .route(
            "/actuators",
            post(routes::actuators::create_actuator).patch(routes::actuators::update_actuators),
        )
        .route("/actuators/{actuator_id}", get(routes::actuators::get_actuator))
        .route(
            "/actuators/{actuator_id}/state",
            get(routes::actuators::get_state),
        )
        .route(
            "/actuators/{actuator_id}/last_activated",
            patch(routes::actuators::update_last_activated),
        )
        // Sensors
        .route(
            "/sensors/{sensor_id}/actuators",
            get(routes::actuators::list_for_sensor),
        )
        .route(
            "/sensors/{sensor_id}/measurements/last",
            get(routes::measurements::get_last),
        )
        // Measurements
        .route(
            "/measurements",
            post(routes::measurements::create_measurement),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the router on a pre-bound listener.
///
/// Accepting a bound `TcpListener` lets the caller read the actual port
/// before starting (useful when `port = 0`).
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(app_state);

    tracing::info!("aquapi server listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
