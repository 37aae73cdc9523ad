use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::services::challenge_service::TransitionRejection;
use shared::services::errors::{
    challenge_service_errors::ChallengeServiceError, stats_service_errors::StatsServiceError,
    validation_errors::ValidationError,
};
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    ChallengeService(ChallengeServiceError),
    StatsService(StatsServiceError),
    Rejected(TransitionRejection),
    ChallengeNotFound(String),
    BadRequest(String),
    MissingActor,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl From<ChallengeServiceError> for ApiError {
    fn from(error: ChallengeServiceError) -> Self {
        ApiError::ChallengeService(error)
    }
}

impl From<StatsServiceError> for ApiError {
    fn from(error: StatsServiceError) -> Self {
        ApiError::StatsService(error)
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ApiError::ChallengeService(ChallengeServiceError::Validation(error))
    }
}

impl From<TransitionRejection> for ApiError {
    fn from(rejection: TransitionRejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn internal(detail: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    error!(error = %detail, "Request failed on store access");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "Internal server error".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::ChallengeService(ChallengeServiceError::Validation(e))
            | ApiError::StatsService(StatsServiceError::Validation(e)) => {
                (StatusCode::BAD_REQUEST, "validation_error", e.to_string())
            }
            ApiError::ChallengeService(ChallengeServiceError::Repository(e)) => internal(&e),
            ApiError::StatsService(StatsServiceError::Repository(e)) => internal(&e),

            ApiError::Rejected(TransitionRejection::NotFound) => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Challenge not found".to_string(),
            ),
            ApiError::Rejected(TransitionRejection::NotAuthorized) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "You are not allowed to perform this action on the challenge".to_string(),
            ),
            ApiError::Rejected(TransitionRejection::WrongState { current }) => (
                StatusCode::CONFLICT,
                "wrong_state",
                format!("Challenge is {}", current),
            ),
            ApiError::Rejected(TransitionRejection::Conflict) => (
                StatusCode::CONFLICT,
                "conflict",
                "Challenge was modified concurrently, retry the request".to_string(),
            ),

            ApiError::ChallengeNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Challenge {} not found", id),
            ),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::MissingActor => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing x-actor-id header".to_string(),
            ),
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}
