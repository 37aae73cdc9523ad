use crate::repositories::errors::stats_repository_errors::StatsRepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum ChallengeRepositoryError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
}

// Stats updates travel in the same transaction as challenge completions
impl From<StatsRepositoryError> for ChallengeRepositoryError {
    fn from(error: StatsRepositoryError) -> Self {
        match error {
            StatsRepositoryError::Serialization(msg) => ChallengeRepositoryError::Serialization(msg),
            StatsRepositoryError::DynamoDb(msg) => ChallengeRepositoryError::DynamoDb(msg),
        }
    }
}
