pub mod challenges;
pub mod games;
pub mod health;
pub mod stats;
