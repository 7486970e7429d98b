use axum::{
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::MatchRepository,
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::Recommender,
};

pub mod matches;
pub mod recommendations;
pub mod reminders;
pub mod teams;
pub mod users;

/// Shared application state
pub struct AppState {
    pub repository: Arc<dyn MatchRepository>,
    pub recommender: Recommender,
    /// Limit used when a recommendation request names none
    pub default_limit: usize,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn MatchRepository>,
        recommender: Recommender,
        default_limit: usize,
    ) -> Self {
        Self {
            repository,
            recommender,
            default_limit,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        // Outermost first: the request ID must exist before the trace span is made
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recommendations", get(recommendations::recommend))
        .route("/users", post(users::create))
        .route("/users/:user_id", get(users::get))
        .route("/teams", get(teams::list).post(teams::create))
        .route("/teams/:team_id", get(teams::get).delete(teams::remove))
        .route("/matches", get(matches::list).post(matches::create))
        .route("/matches/:match_id", delete(matches::remove))
        .route("/matches/:match_id/join", post(matches::join))
        .route(
            "/matches/:match_id/participants/:user_id",
            delete(matches::remove_participant),
        )
        .route("/matches/:match_id/team-b", delete(matches::remove_team_b))
        .route("/reminders/due", get(reminders::due))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
