use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    errors::ApiError,
    services::users::CreateUserInput,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for user account endpoints
pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/", post(register))
        .route("/validate", post(validate))
        .route("/{id}", get(get_user))
}

async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .services
        .users
        .list_users()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(users))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .get_user(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;
    Ok(success_response(user))
}

/// Register an account
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = CreateUserInput {
        username: payload.username,
        email: payload.email,
        password: payload.password,
        phone: payload.phone,
        address: payload.address,
        city: payload.city,
        region: payload.region,
        role: None,
    };

    let user = state
        .services
        .users
        .create_user(input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(serde_json::json!({
        "message": "Account created",
        "user": user,
    })))
}

/// Verify credentials
async fn validate(
    State(state): State<AppState>,
    Json(payload): Json<ValidateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .validate_user(&payload.username, &payload.password)
        .await
        .map_err(map_service_error)?;

    match user {
        Some(user) => Ok(success_response(serde_json::json!({
            "message": "Login successful",
            "user": user,
        }))),
        None => Err(ApiError::ServiceError(
            crate::errors::ServiceError::AuthError("Invalid credentials".to_string()),
        )),
    }
}

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub username: String,
    pub password: String,
}
