use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::models::challenge::{Challenge, GameResult};
use shared::services::challenge_service::{ChallengeList, Transition};
use tracing::debug;

use crate::{error::ApiError, middleware::actor::Actor, state::AppState};

type PathParam = Result<Path<String>, PathRejection>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/challenges", post(create_challenge))
        .route("/challenges/{challenge_id}", get(get_challenge))
        .route("/challenges/{challenge_id}/accept", post(accept_challenge))
        .route("/challenges/{challenge_id}/report", post(report_result))
        .route("/challenges/{challenge_id}/cancel", post(cancel_challenge))
        .route("/users/{user_id}/challenges", get(list_challenges))
}

#[derive(Debug, Deserialize)]
pub struct CreateChallengeRequest {
    pub opponent_id: String,
    #[serde(default)]
    pub opponent_name: Option<String>,
    pub game: String,
}

#[derive(Debug, Serialize)]
pub struct CreateChallengeResponse {
    pub challenge_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportResultRequest {
    pub result: String,
    #[serde(default)]
    pub winner_id: Option<String>,
}

fn applied(transition: Transition) -> Result<Json<Challenge>, ApiError> {
    match transition {
        Transition::Applied(challenge) => Ok(Json(challenge)),
        Transition::Rejected(rejection) => Err(rejection.into()),
    }
}

async fn create_challenge(
    State(state): State<AppState>,
    actor: Actor,
    payload: Result<Json<CreateChallengeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateChallengeResponse>), ApiError> {
    let Json(request) = payload?;
    let opponent_name = request
        .opponent_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| request.opponent_id.clone());

    let challenge = state
        .challenge_service
        .create_challenge(
            &actor.id,
            &actor.name,
            &request.opponent_id,
            &opponent_name,
            &request.game,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateChallengeResponse {
            challenge_id: challenge.id,
        }),
    ))
}

async fn get_challenge(
    State(state): State<AppState>,
    path: PathParam,
) -> Result<Json<Challenge>, ApiError> {
    let Path(challenge_id) = path?;
    match state.challenge_service.get_challenge(&challenge_id).await? {
        Some(challenge) => Ok(Json(challenge)),
        None => {
            debug!(challenge_id = %challenge_id, "Challenge not found");
            Err(ApiError::ChallengeNotFound(challenge_id))
        }
    }
}

async fn accept_challenge(
    State(state): State<AppState>,
    actor: Actor,
    path: PathParam,
) -> Result<Json<Challenge>, ApiError> {
    let Path(challenge_id) = path?;
    applied(
        state
            .challenge_service
            .accept_challenge(&challenge_id, &actor.id)
            .await?,
    )
}

async fn report_result(
    State(state): State<AppState>,
    actor: Actor,
    path: PathParam,
    payload: Result<Json<ReportResultRequest>, JsonRejection>,
) -> Result<Json<Challenge>, ApiError> {
    let Path(challenge_id) = path?;
    let Json(request) = payload?;
    let result: GameResult = request.result.parse()?;

    applied(
        state
            .challenge_service
            .report_result(
                &challenge_id,
                &actor.id,
                result,
                request.winner_id.as_deref(),
            )
            .await?,
    )
}

async fn cancel_challenge(
    State(state): State<AppState>,
    actor: Actor,
    path: PathParam,
) -> Result<Json<Challenge>, ApiError> {
    let Path(challenge_id) = path?;
    applied(
        state
            .challenge_service
            .cancel_challenge(&challenge_id, &actor.id)
            .await?,
    )
}

async fn list_challenges(
    State(state): State<AppState>,
    path: PathParam,
) -> Result<Json<ChallengeList>, ApiError> {
    let Path(user_id) = path?;
    Ok(Json(state.challenge_service.list_challenges(&user_id).await?))
}
