pub mod adapters;
pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod schemas;
pub mod secrets;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;
pub mod vendor;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::health::HealthMonitor;
use crate::services::ActivationOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ActivationOrchestrator>,
    pub health: Arc<HealthMonitor>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/sales", post(handlers::sales::process_sale))
        .route("/voids", post(handlers::voids::process_void))
        .route("/status/:unique_ref", get(handlers::status::get_status))
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(handlers::openapi::openapi_json))
        .layer(axum::middleware::from_fn(
            middleware::request_context_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
