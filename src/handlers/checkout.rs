use crate::handlers::common::success_response;
use crate::{
    errors::{ApiError, ServiceError},
    services::checkout::CallbackParams,
    AppState,
};
use axum::{
    extract::{Json, Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Creates the router for checkout and provider-callback endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(begin_checkout))
        .route("/success", get(payment_success))
        .route("/failure", get(payment_failure))
        .route("/pending", get(payment_pending))
}

/// Start a checkout attempt and hand back the provider's redirect URL
async fn begin_checkout(
    State(state): State<AppState>,
    Json(payload): Json<BeginCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .services
        .checkout
        .begin_checkout(payload.user_id)
        .await
        .map_err(|err| match err {
            ServiceError::InvalidOperation(message) => ApiError::BadRequest {
                message,
                error_code: Some("EMPTY_CART".to_string()),
            },
            other => ApiError::ServiceError(other),
        })?;

    Ok(success_response(serde_json::json!({
        "preference_id": created.id,
        "init_point": created.init_point,
    })))
}

/// Provider success callback; reconciles and redirects to the success view
async fn payment_success(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let redirect = state.services.checkout.reconcile_success(params).await;
    Redirect::to(&redirect.redirect_url(state.services.checkout.settings()))
}

/// Provider failure callback; redirects to the failure view
async fn payment_failure(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let redirect = state.services.checkout.reconcile_failure(params).await;
    Redirect::to(&redirect.redirect_url(state.services.checkout.settings()))
}

/// Provider pending callback; redirects to the pending view
async fn payment_pending(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let redirect = state.services.checkout.reconcile_pending(params).await;
    Redirect::to(&redirect.redirect_url(state.services.checkout.settings()))
}

#[derive(Debug, Deserialize)]
pub struct BeginCheckoutRequest {
    pub user_id: Uuid,
}
