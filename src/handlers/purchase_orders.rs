use super::common::{created_response, map_service_error, success_response};
use crate::{
    auth::Actor,
    entities::Currency,
    errors::ApiError,
    handlers::AppState,
    services::order_derivation::{DeriveOrderCommand, OrderLineInput, OrderSource},
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub provider_id: i32,
    pub lines: Vec<OrderLineInput>,
    pub withholding_percent: Option<Decimal>,
    #[serde(default)]
    pub currency: Currency,
}

/// Create a purchase order that does not come from any request
pub async fn create_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .derivation
        .derive_order(
            &actor,
            DeriveOrderCommand {
                source: OrderSource::Direct,
                provider_id: Some(payload.provider_id),
                lines: payload.lines,
                withholding_percent: payload.withholding_percent,
                currency: payload.currency,
            },
        )
        .await
        .map_err(map_service_error)?;

    info!("Purchase order created: {}", order.order.id);
    Ok(created_response(order))
}

/// Get a purchase order with its lines and linked requests
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .purchase_orders
        .get(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Mark a purchase order received and add its lines to stock
pub async fn complete_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .purchase_orders
        .complete(&actor, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

pub async fn void_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .purchase_orders
        .void(&actor, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

pub async fn reopen_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .purchase_orders
        .reopen(&actor, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/:id", get(get_purchase_order))
        .route("/:id/complete", post(complete_purchase_order))
        .route("/:id/void", post(void_purchase_order))
        .route("/:id/reopen", post(reopen_purchase_order))
}
