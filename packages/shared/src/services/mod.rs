pub mod challenge_service;
pub mod errors;
pub mod stats_service;
