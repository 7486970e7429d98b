use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{NewTeam, Team},
    routes::{matches::ActorQuery, AppState},
    services::teams,
};

#[derive(Debug, Deserialize)]
pub struct MemberQuery {
    pub user_id: i64,
}

/// Creates a team
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(new_team): Json<NewTeam>,
) -> AppResult<(StatusCode, Json<Team>)> {
    let team = teams::create_team(state.repository.clone(), new_team).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// Lists the teams a user captains or plays for
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<Vec<Team>>> {
    let found = teams::teams_for_user(state.repository.clone(), query.user_id).await?;
    Ok(Json(found))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<i64>,
) -> AppResult<Json<Team>> {
    Ok(Json(teams::get_team(state.repository.clone(), team_id).await?))
}

/// Deletes a team
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> AppResult<Json<Value>> {
    teams::delete_team(state.repository.clone(), team_id, actor.requested_by).await?;
    Ok(Json(json!({ "message": "Team deleted successfully" })))
}
