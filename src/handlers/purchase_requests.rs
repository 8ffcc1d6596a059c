use super::common::{created_response, map_service_error, success_response, validate_input, StatusFilter};
use crate::{
    auth::Actor,
    entities::RequestStatus,
    errors::ApiError,
    handlers::AppState,
    services::requests::{ApproveRequestCommand, SubmitRequestCommand},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::info;

/// Submit a new purchase request for the calling employee
pub async fn submit_purchase_request(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<SubmitRequestCommand>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .requests
        .submit(&actor, payload)
        .await
        .map_err(map_service_error)?;

    info!("Purchase request created: {}", detail.request.id);
    Ok(created_response(detail))
}

pub async fn list_purchase_requests(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter<RequestStatus>>,
) -> Result<impl IntoResponse, ApiError> {
    let requests = state
        .services
        .requests
        .list(filter.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(requests))
}

/// Get a purchase request with its line items
pub async fn get_purchase_request(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .services
        .requests
        .get(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Pending requests sharing a product or category with request `id`
pub async fn get_groupable_requests(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .requests
        .get(id)
        .await
        .map_err(map_service_error)?;

    let groups = state.services.grouping.find_groupable_requests(id).await;
    Ok(success_response(groups))
}

/// Approve a pending request by pricing its lines into a purchase order
pub async fn approve_purchase_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<ApproveRequestCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .requests
        .approve(&actor, id, payload)
        .await
        .map_err(map_service_error)?;

    info!(
        "Purchase request {} approved as purchase order {}",
        id, order.order.id
    );
    Ok(created_response(order))
}

pub async fn reject_purchase_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state
        .services
        .requests
        .reject(&actor, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(request))
}

pub fn purchase_request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(submit_purchase_request).get(list_purchase_requests),
        )
        .route("/:id", get(get_purchase_request))
        .route("/:id/groupable", get(get_groupable_requests))
        .route("/:id/approve", post(approve_purchase_request))
        .route("/:id/reject", post(reject_purchase_request))
}
