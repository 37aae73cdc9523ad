use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use shared::models::stats::{OverallStanding, StatsSummary, UserStats};
use shared::services::stats_service::DEFAULT_LEADERBOARD_LIMIT;

use crate::{error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/leaderboard", get(overall_leaderboard))
        .route("/leaderboard/{game}", get(game_leaderboard))
        .route("/users/{user_id}/stats", get(user_stats))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

impl LeaderboardQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
pub struct UserStatsQuery {
    pub game: Option<String>,
}

async fn overall_leaderboard(
    State(state): State<AppState>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<Vec<OverallStanding>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(
        state
            .stats_service
            .overall_leaderboard(query.limit())
            .await?,
    ))
}

async fn game_leaderboard(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<Vec<StatsSummary>>, ApiError> {
    let Path(game) = path?;
    let Query(query) = query?;
    Ok(Json(
        state
            .stats_service
            .leaderboard(&game, query.limit())
            .await?,
    ))
}

async fn user_stats(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<UserStatsQuery>, QueryRejection>,
) -> Result<Json<UserStats>, ApiError> {
    let Path(user_id) = path?;
    let Query(query) = query?;
    Ok(Json(
        state
            .stats_service
            .user_stats(&user_id, query.game.as_deref())
            .await?,
    ))
}
