//! Process-local stores for running without DynamoDB and for tests.
//!
//! Records are kept in insertion order, so listings are stable between
//! reads. A single write lock covers each conditional update, which gives
//! the same all-or-nothing behaviour as the DynamoDB condition expressions.
//! A completion holds the challenge lock and then the stats lock, matching
//! the DynamoDB transaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::challenge::{Challenge, ChallengeStatus};
use crate::models::stats::{PlayerGameStats, StatsDelta, StatsIncrement};
use crate::repositories::challenge_repository::ChallengeRepository;
use crate::repositories::errors::challenge_repository_errors::ChallengeRepositoryError;
use crate::repositories::errors::stats_repository_errors::StatsRepositoryError;
use crate::repositories::stats_repository::PlayerStatsRepository;

pub struct InMemoryChallengeRepository {
    challenges: RwLock<Vec<Challenge>>,
    stats: Arc<InMemoryPlayerStatsRepository>,
}

impl InMemoryChallengeRepository {
    /// Completed challenges write their increments into `stats`.
    pub fn new(stats: Arc<InMemoryPlayerStatsRepository>) -> Self {
        Self {
            challenges: RwLock::new(Vec::new()),
            stats,
        }
    }
}

#[async_trait]
impl ChallengeRepository for InMemoryChallengeRepository {
    async fn create_challenge(
        &self,
        challenge: &Challenge,
    ) -> Result<(), ChallengeRepositoryError> {
        let mut challenges = self.challenges.write().await;
        if challenges.iter().any(|c| c.id == challenge.id) {
            return Err(ChallengeRepositoryError::DynamoDb(format!(
                "challenge {} already exists",
                challenge.id
            )));
        }
        challenges.push(challenge.clone());
        Ok(())
    }

    async fn get_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<Challenge>, ChallengeRepositoryError> {
        let challenges = self.challenges.read().await;
        Ok(challenges.iter().find(|c| c.id == challenge_id).cloned())
    }

    async fn update_challenge_if_status(
        &self,
        challenge: &Challenge,
        expected: ChallengeStatus,
    ) -> Result<bool, ChallengeRepositoryError> {
        let mut challenges = self.challenges.write().await;
        match challenges.iter_mut().find(|c| c.id == challenge.id) {
            Some(stored) if stored.status == expected => {
                *stored = challenge.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_challenge(
        &self,
        challenge: &Challenge,
        expected: ChallengeStatus,
        increments: &[StatsIncrement],
    ) -> Result<bool, ChallengeRepositoryError> {
        let mut challenges = self.challenges.write().await;
        let Some(stored) = challenges
            .iter_mut()
            .find(|c| c.id == challenge.id && c.status == expected)
        else {
            return Ok(false);
        };

        let mut stats = self.stats.stats.write().await;
        let now = Utc::now();
        for increment in increments {
            apply_increment(
                &mut stats,
                &increment.player_id,
                &increment.player_name,
                &increment.game,
                increment.delta,
                now,
            );
        }
        *stored = challenge.clone();
        Ok(true)
    }

    async fn find_challenges_for_user(
        &self,
        user_id: &str,
        status: ChallengeStatus,
    ) -> Result<Vec<Challenge>, ChallengeRepositoryError> {
        let challenges = self.challenges.read().await;
        Ok(challenges
            .iter()
            .filter(|c| c.status == status && c.is_participant(user_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryPlayerStatsRepository {
    stats: RwLock<Vec<PlayerGameStats>>,
}

impl InMemoryPlayerStatsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_increment(
    stats: &mut Vec<PlayerGameStats>,
    player_id: &str,
    player_name: &str,
    game: &str,
    delta: StatsDelta,
    at: DateTime<Utc>,
) {
    match stats
        .iter_mut()
        .find(|s| s.player_id == player_id && s.game == game)
    {
        Some(record) => record.apply(player_name, delta, at),
        None => {
            let mut record = PlayerGameStats::empty(player_id, player_name, game);
            record.apply(player_name, delta, at);
            stats.push(record);
        }
    }
}

#[async_trait]
impl PlayerStatsRepository for InMemoryPlayerStatsRepository {
    async fn increment_stats(
        &self,
        player_id: &str,
        player_name: &str,
        game: &str,
        delta: StatsDelta,
    ) -> Result<(), StatsRepositoryError> {
        let mut stats = self.stats.write().await;
        apply_increment(&mut stats, player_id, player_name, game, delta, Utc::now());
        Ok(())
    }

    async fn get_stats(
        &self,
        player_id: &str,
        game: &str,
    ) -> Result<Option<PlayerGameStats>, StatsRepositoryError> {
        let stats = self.stats.read().await;
        Ok(stats
            .iter()
            .find(|s| s.player_id == player_id && s.game == game)
            .cloned())
    }

    async fn find_stats_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<PlayerGameStats>, StatsRepositoryError> {
        let stats = self.stats.read().await;
        Ok(stats
            .iter()
            .filter(|s| s.player_id == player_id)
            .cloned()
            .collect())
    }

    async fn find_stats_for_game(
        &self,
        game: &str,
    ) -> Result<Vec<PlayerGameStats>, StatsRepositoryError> {
        let stats = self.stats.read().await;
        Ok(stats.iter().filter(|s| s.game == game).cloned().collect())
    }

    async fn list_all_stats(&self) -> Result<Vec<PlayerGameStats>, StatsRepositoryError> {
        Ok(self.stats.read().await.clone())
    }
}
