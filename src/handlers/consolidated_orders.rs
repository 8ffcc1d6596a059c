use super::common::{created_response, map_service_error, success_response, validate_input, StatusFilter};
use crate::{
    auth::Actor,
    entities::{ConsolidatedOrderStatus, Currency},
    errors::ApiError,
    handlers::AppState,
    services::{
        consolidation::ConsolidateCommand,
        order_derivation::{DeriveOrderCommand, OrderLineInput, OrderSource},
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertConsolidatedOrderRequest {
    /// Falls back to the provider chosen at consolidation time
    pub provider_id: Option<i32>,
    pub lines: Vec<OrderLineInput>,
    pub withholding_percent: Option<Decimal>,
    #[serde(default)]
    pub currency: Currency,
}

/// Merge pending requests into a consolidated order
pub async fn create_consolidated_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<ConsolidateCommand>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .consolidation
        .consolidate(&actor, payload)
        .await
        .map_err(map_service_error)?;

    info!("Consolidated order created: {}", order.id);
    Ok(created_response(order))
}

pub async fn list_consolidated_orders(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter<ConsolidatedOrderStatus>>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .consolidation
        .list(filter.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

pub async fn get_consolidated_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .consolidation
        .get(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Convert a consolidated order into a priced purchase order
pub async fn convert_consolidated_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<ConvertConsolidatedOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .derivation
        .derive_order(
            &actor,
            DeriveOrderCommand {
                source: OrderSource::Consolidated(id),
                provider_id: payload.provider_id,
                lines: payload.lines,
                withholding_percent: payload.withholding_percent,
                currency: payload.currency,
            },
        )
        .await
        .map_err(map_service_error)?;

    info!(
        "Consolidated order {} converted to purchase order {}",
        id, order.order.id
    );
    Ok(created_response(order))
}

pub fn consolidated_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(create_consolidated_order).get(list_consolidated_orders),
        )
        .route("/:id", get(get_consolidated_order))
        .route("/:id/convert", post(convert_consolidated_order))
}
