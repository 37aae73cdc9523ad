pub mod challenge_repository;
pub mod errors;
pub mod in_memory;
pub mod stats_repository;
