use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::RecommendationResponse,
    routes::AppState,
    services::recommendations,
};

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub user_id: i64,
    pub limit: Option<usize>,
}

/// Handler for recommendations endpoint
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<Vec<RecommendationResponse>>> {
    let limit = query.limit.unwrap_or(state.default_limit);

    tracing::info!(
        request_id = %request_id,
        user_id = query.user_id,
        limit,
        "Processing recommendation request"
    );

    let recommendations = recommendations::get_recommendations(
        state.repository.clone(),
        &state.recommender,
        query.user_id,
        limit,
        Utc::now().date_naive(),
    )
    .await?;

    Ok(Json(recommendations))
}
