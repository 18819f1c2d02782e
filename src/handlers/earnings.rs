use crate::handlers::common::{map_service_error, success_response};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Creates the router for earnings endpoints
pub fn earnings_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_earnings))
        .route("/percentage", put(set_percentage))
}

/// Accumulated earnings, current percentage and full history
async fn get_earnings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .services
        .earnings
        .get_earnings()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(snapshot))
}

/// Change the percentage applied to future sales
async fn set_percentage(
    State(state): State<AppState>,
    Json(payload): Json<SetPercentageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .earnings
        .set_percentage(payload.percentage)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Percentage updated",
        "percentage": payload.percentage,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SetPercentageRequest {
    pub percentage: Decimal,
}
