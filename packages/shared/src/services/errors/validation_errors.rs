/// Bad input caught before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("A player cannot challenge themselves")]
    InvalidOpponent,
    #[error("Unsupported game: {0}")]
    UnsupportedGame(String),
    #[error("Result must be 'win', 'loss' or 'draw', got '{0}'")]
    InvalidResult(String),
    #[error("Player {0} cannot be recorded as the winner of this challenge")]
    InvalidWinner(String),
    #[error("{0} cannot be empty")]
    EmptyIdentifier(&'static str),
}

/// Rejects identifiers that are empty or only whitespace.
pub fn require_non_empty(value: &str, name: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyIdentifier(name))
    } else {
        Ok(())
    }
}
