use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{DeletedMatch, JoinRequest, MatchView, NewMatch},
    routes::AppState,
    services::matches,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<i64>,
}

/// Identifies the user acting on a match
#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub requested_by: i64,
}

/// Lists upcoming matches
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<MatchView>>> {
    let views = matches::list_upcoming(
        state.repository.clone(),
        query.user_id,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(Json(views))
}

/// Creates a match
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(new_match): Json<NewMatch>,
) -> AppResult<(StatusCode, Json<MatchView>)> {
    let view =
        matches::create_match(state.repository.clone(), new_match, Utc::now().date_naive())
            .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Joins a match as a player or as the opposing team
pub async fn join(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
    Json(request): Json<JoinRequest>,
) -> AppResult<Json<Value>> {
    let message = matches::join_match(state.repository.clone(), match_id, request).await?;
    Ok(Json(json!({ "message": message })))
}

/// Removes a participant from a match
pub async fn remove_participant(
    State(state): State<Arc<AppState>>,
    Path((match_id, user_id)): Path<(i64, i64)>,
    Query(actor): Query<ActorQuery>,
) -> AppResult<Json<Value>> {
    matches::remove_participant(
        state.repository.clone(),
        match_id,
        user_id,
        actor.requested_by,
    )
    .await?;
    Ok(Json(json!({ "message": "Participant removed successfully" })))
}

/// Removes the opposing team from a team match
pub async fn remove_team_b(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> AppResult<Json<Value>> {
    matches::remove_team_b(state.repository.clone(), match_id, actor.requested_by).await?;
    Ok(Json(json!({ "message": "Opposing team removed successfully" })))
}

/// Deletes a match
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> AppResult<Json<DeletedMatch>> {
    let deleted =
        matches::delete_match(state.repository.clone(), match_id, actor.requested_by).await?;
    Ok(Json(deleted))
}
