pub mod challenge_repository_errors;
pub mod stats_repository_errors;
