use crate::handlers::common::{map_service_error, success_response};
use crate::{
    entities::SaleStatus,
    errors::ApiError,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Creates the router for sales history endpoints
pub fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(all_history))
        .route("/{id}", get(user_history))
        .route("/{id}/status", put(update_status))
}

/// Full sales history (admin view)
async fn all_history(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let sales = state
        .services
        .history
        .all_history()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sales))
}

/// One user's purchase history
async fn user_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let sales = state
        .services
        .history
        .history_for_user(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sales))
}

/// Admin status transition
async fn update_status(
    State(state): State<AppState>,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = SaleStatus::parse(&payload.status).ok_or_else(|| ApiError::ValidationError(
        "Status must be one of: pendiente, completada, cancelada".to_string(),
    ))?;

    let sale = state
        .services
        .history
        .update_status(sale_id, status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sale))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}
