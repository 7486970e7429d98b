use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{NewUser, User},
    routes::AppState,
};

/// Registers a player
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(new_user): Json<NewUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    if new_user.email.trim().is_empty() {
        return Err(AppError::InvalidInput("Email is required".to_string()));
    }

    let user = state.repository.create_user(new_user).await?;
    tracing::info!(user_id = user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Fetches a player by id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<User>> {
    state
        .repository
        .find_user(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}
