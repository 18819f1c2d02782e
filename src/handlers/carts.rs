use crate::handlers::common::{
    map_service_error, no_content_response, success_response, validate_input,
};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/{user_id}", get(get_cart))
        .route("/items", post(add_to_cart))
        .route("/items", put(set_quantity))
        .route("/items", delete(remove_from_cart))
        .route("/{user_id}", delete(clear_cart))
}

/// Get a user's cart with read-time pricing
async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .get(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

/// Add a product; an existing line accumulates quantity
async fn add_to_cart(
    State(state): State<AppState>,
    Json(payload): Json<CartLineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    state
        .services
        .cart
        .add(payload.user_id, payload.product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Product added to cart"
    })))
}

/// Replace a line's quantity
async fn set_quantity(
    State(state): State<AppState>,
    Json(payload): Json<CartLineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    state
        .services
        .cart
        .set_quantity(payload.user_id, payload.product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Quantity updated"
    })))
}

/// Remove one product from the cart
async fn remove_from_cart(
    State(state): State<AppState>,
    Json(payload): Json<RemoveLineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove(payload.user_id, payload.product_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Empty the user's cart
async fn clear_cart(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .clear(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct CartLineRequest {
    pub user_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveLineRequest {
    pub user_id: Uuid,
    pub product_id: Uuid,
}
