use crate::repositories::errors::stats_repository_errors::StatsRepositoryError;
use crate::services::errors::validation_errors::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum StatsServiceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Repository error: {0}")]
    Repository(#[from] StatsRepositoryError),
}
