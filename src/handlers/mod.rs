pub mod common;
pub mod consolidated_orders;
pub mod health;
pub mod order_totals;
pub mod purchase_orders;
pub mod purchase_requests;

use axum::Router;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Versioned API surface, nested under `/api/v1` by [`crate::build_router`]
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest(
            "/purchase-requests",
            purchase_requests::purchase_request_routes(),
        )
        .nest(
            "/consolidated-orders",
            consolidated_orders::consolidated_order_routes(),
        )
        .nest("/purchase-orders", purchase_orders::purchase_order_routes())
        .nest("/order-totals", order_totals::order_totals_routes())
}
