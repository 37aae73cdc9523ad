pub mod challenge_service_errors;
pub mod stats_service_errors;
pub mod validation_errors;
