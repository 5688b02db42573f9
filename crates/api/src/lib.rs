//! HTTP API server for the event-driven order lifecycle.
//!
//! Provides REST endpoints for creating orders and changing their status,
//! with structured logging (tracing) and Prometheus metrics. Every write is
//! announced on the order events topic and completed asynchronously by the
//! event processor.

pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch};
use domain::{EventPublisher, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/api/orders",
            get(routes::orders::list).post(routes::orders::create),
        )
        .route("/api/orders/{id}", get(routes::orders::get))
        .route(
            "/api/orders/{id}/status",
            patch(routes::orders::update_status),
        )
        .route("/api/orders/status/{status}", get(routes::orders::by_status))
        .route(
            "/api/orders/customer/{customer_name}",
            get(routes::orders::by_customer),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state from the store and publisher chosen at startup.
pub fn create_state(
    store: Arc<dyn OrderStore>,
    publisher: Arc<dyn EventPublisher>,
) -> Arc<AppState> {
    Arc::new(AppState {
        order_service: OrderService::new(store, publisher),
    })
}
