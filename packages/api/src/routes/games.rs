use axum::{extract::State, routing::get, Json, Router};
use shared::models::game::SupportedGames;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/games", get(list_games))
}

async fn list_games(State(state): State<AppState>) -> Json<SupportedGames> {
    Json(state.stats_service.supported_games().clone())
}
