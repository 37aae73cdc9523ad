use crate::repositories::errors::challenge_repository_errors::ChallengeRepositoryError;
use crate::services::errors::validation_errors::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ChallengeServiceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Repository error: {0}")]
    Repository(#[from] ChallengeRepositoryError),
}
