use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    errors::ApiError,
    services::catalog::{CreateProductInput, UpdateProductInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/", post(create_product))
        .route("/{id}", get(get_product))
        .route("/{id}", put(update_product))
        .route("/{id}", delete(delete_product))
        .route("/{id}/categories", get(product_categories))
        .route("/{id}/categories", post(set_product_categories))
        .route("/{id}/categories/{category_id}", post(add_product_category))
        .route(
            "/{id}/categories/{category_id}",
            delete(remove_product_category),
        )
        .route("/{id}/discounts", get(list_product_discounts))
        .route("/{id}/discounts", post(upsert_product_discount))
}

/// Creates the router for discount tier endpoints not scoped to a product
pub fn discounts_routes() -> Router<AppState> {
    Router::new().route("/{id}", delete(deactivate_discount))
}

/// List the whole catalog
async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .list_products()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

/// Get a single product
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .require_product(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

/// Create a product
async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = CreateProductInput {
        name: payload.name,
        description: payload.description,
        price: payload.price,
        stock: payload.stock,
        image_url: payload.image_url,
        categories: payload.categories,
    };

    let product = state
        .services
        .catalog
        .create_product(input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

/// Update a product (partial)
async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .update_product(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

/// Delete a product
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_product(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Categories assigned to a product
async fn product_categories(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state
        .services
        .catalog
        .categories_of_product(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(categories))
}

/// Replace a product's category set
async fn set_product_categories(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetCategoriesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .set_categories(id, payload.categories)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(serde_json::json!({
        "message": "Categories assigned"
    })))
}

/// Add a single category without touching the rest
async fn add_product_category(
    State(state): State<AppState>,
    Path((id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .add_category(id, category_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(serde_json::json!({
        "message": "Category added"
    })))
}

/// Remove a single category from a product
async fn remove_product_category(
    State(state): State<AppState>,
    Path((id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .remove_category(id, category_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(serde_json::json!({
        "message": "Category removed"
    })))
}

/// Active discount tiers for a product
async fn list_product_discounts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let tiers = state
        .services
        .discounts
        .list_tiers(id, false)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(tiers))
}

/// Create or update a discount tier for a product
async fn upsert_product_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpsertDiscountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let tier = state
        .services
        .discounts
        .upsert_tier(id, payload.min_quantity, payload.percentage)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(tier))
}

/// Soft-delete a discount tier
async fn deactivate_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .discounts
        .deactivate_tier(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub stock: i32,
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SetCategoriesRequest {
    pub categories: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertDiscountRequest {
    #[validate(range(min = 1))]
    pub min_quantity: i32,
    pub percentage: Decimal,
}
