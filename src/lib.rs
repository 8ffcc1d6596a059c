//! Requisition API Library
//!
//! Purchase requests, grouping of related requests, consolidation into
//! supplier orders and purchase orders with VAT withholding totals.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod migrator;
pub mod services;
pub mod store;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::services::ServiceContainer;
use crate::store::RequisitionStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub store: Arc<dyn RequisitionStore>,
    pub services: ServiceContainer,
}

impl AppState {
    pub fn new(
        config: config::AppConfig,
        store: Arc<dyn RequisitionStore>,
        services: ServiceContainer,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            services,
        }
    }
}

/// Full application router: probes at the root, workflows under `/api/v1`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::health::health_routes())
        .merge(handlers::health::metrics_routes())
        .nest("/api/v1", handlers::api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}
