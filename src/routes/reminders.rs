use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    routes::AppState,
    services::reminders::{self, ReminderNotice},
};

#[derive(Debug, Deserialize)]
pub struct DueQuery {
    pub date: Option<NaiveDate>,
}

/// Matches played on the given day (today by default) with their participants
pub async fn due(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DueQuery>,
) -> AppResult<Json<Vec<ReminderNotice>>> {
    let day = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let notices = reminders::due_reminders(state.repository.clone(), day).await?;
    Ok(Json(notices))
}
