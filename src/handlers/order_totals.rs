use super::common::{map_service_error, success_response};
use crate::{
    errors::{ApiError, ServiceError},
    handlers::AppState,
    services::totals::{check_unit_price, compute_totals, line_total, OrderTotals},
};
use axum::{extract::Json, response::IntoResponse, routing::post, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsLine {
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsPreviewRequest {
    pub lines: Vec<TotalsLine>,
    /// Defaults to 75 when omitted
    pub withholding_percent: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TotalsPreviewResponse {
    pub line_totals: Vec<Decimal>,
    #[serde(flatten)]
    pub totals: OrderTotals,
}

/// Preview order totals without creating anything
pub async fn preview_order_totals(
    Json(payload): Json<TotalsPreviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(percent) = payload.withholding_percent {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(map_service_error(ServiceError::InvalidInput(format!(
                "Withholding percent {} must be between 0 and 100",
                percent
            ))));
        }
    }

    for (index, line) in payload.lines.iter().enumerate() {
        check_unit_price(index + 1, line.unit_price).map_err(map_service_error)?;
    }

    let priced: Vec<(i32, Decimal)> = payload
        .lines
        .iter()
        .map(|line| (line.quantity, line.unit_price))
        .collect();

    Ok(success_response(TotalsPreviewResponse {
        line_totals: priced.iter().map(|(q, p)| line_total(*q, *p)).collect(),
        totals: compute_totals(&priced, payload.withholding_percent),
    }))
}

pub fn order_totals_routes() -> Router<AppState> {
    Router::new().route("/", post(preview_order_totals))
}
