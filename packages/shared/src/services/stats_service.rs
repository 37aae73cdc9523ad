use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::models::challenge::{Challenge, Outcome};
use crate::models::game::SupportedGames;
use crate::models::stats::{
    win_rate, GameBreakdown, OverallStanding, PlayerGameStats, StatsIncrement, StatsSummary,
    UserStats,
};
use crate::repositories::stats_repository::PlayerStatsRepository;
use crate::services::errors::stats_service_errors::StatsServiceError;
use crate::services::errors::validation_errors::{require_non_empty, ValidationError};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// Records finished challenges and ranks players per game and overall.
#[derive(Clone)]
pub struct StatsService {
    repository: Arc<dyn PlayerStatsRepository + Send + Sync>,
    games: SupportedGames,
}

impl StatsService {
    pub fn new(
        repository: Arc<dyn PlayerStatsRepository + Send + Sync>,
        games: SupportedGames,
    ) -> Self {
        StatsService { repository, games }
    }

    pub fn supported_games(&self) -> &SupportedGames {
        &self.games
    }

    fn ensure_supported(&self, game: &str) -> Result<(), ValidationError> {
        if self.games.contains(game) {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedGame(game.to_string()))
        }
    }

    /// Applies one increment per involved player for a completed challenge:
    /// a draw for both sides, or a win for the winner and a loss for the loser.
    ///
    /// Each increment is its own store write. The lifecycle engine does not
    /// go through here; it completes the challenge and writes the increments
    /// together via `ChallengeRepository::complete_challenge`.
    pub async fn record_outcome(
        &self,
        challenge: &Challenge,
        outcome: &Outcome,
    ) -> Result<(), StatsServiceError> {
        for increment in StatsIncrement::for_outcome(challenge, outcome) {
            self.repository
                .increment_stats(
                    &increment.player_id,
                    &increment.player_name,
                    &increment.game,
                    increment.delta,
                )
                .await?;
        }

        info!(
            challenge_id = %challenge.id,
            game = %challenge.game,
            result = %outcome.result,
            "Recorded challenge outcome"
        );
        Ok(())
    }

    /// Players with at least one finished game in `game`, most wins first.
    /// Equal win counts keep the order the store returned them in.
    pub async fn leaderboard(
        &self,
        game: &str,
        limit: usize,
    ) -> Result<Vec<StatsSummary>, StatsServiceError> {
        self.ensure_supported(game)?;

        let mut records: Vec<PlayerGameStats> = self
            .repository
            .find_stats_for_game(game)
            .await?
            .into_iter()
            .filter(|record| record.total_games > 0)
            .collect();
        records.sort_by(|a, b| b.wins.cmp(&a.wins));
        records.truncate(limit);

        debug!(game, entries = records.len(), "Built game leaderboard");
        Ok(records.into_iter().map(StatsSummary::from).collect())
    }

    /// Every player's results summed across games, ranked by wins and then
    /// by win rate.
    pub async fn overall_leaderboard(
        &self,
        limit: usize,
    ) -> Result<Vec<OverallStanding>, StatsServiceError> {
        let records = self.repository.list_all_stats().await?;

        // Keeps first-seen order so equal keys rank the same way on every read
        let mut standings: Vec<(OverallStanding, DateTime<Utc>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in records {
            let position = match positions.get(&record.player_id) {
                Some(&position) => position,
                None => {
                    positions.insert(record.player_id.clone(), standings.len());
                    standings.push((
                        OverallStanding {
                            player_id: record.player_id.clone(),
                            player_name: record.player_name.clone(),
                            wins: 0,
                            losses: 0,
                            draws: 0,
                            total_games: 0,
                            win_rate: 0.0,
                            games: BTreeMap::new(),
                        },
                        record.updated_at,
                    ));
                    standings.len() - 1
                }
            };

            let (standing, name_updated_at) = &mut standings[position];
            if record.updated_at >= *name_updated_at {
                standing.player_name = record.player_name.clone();
                *name_updated_at = record.updated_at;
            }
            standing.wins += record.wins;
            standing.losses += record.losses;
            standing.draws += record.draws;
            standing.total_games += record.total_games;
            standing.games.insert(
                record.game,
                GameBreakdown {
                    wins: record.wins,
                    losses: record.losses,
                    draws: record.draws,
                    total_games: record.total_games,
                },
            );
        }

        let mut leaderboard: Vec<OverallStanding> = standings
            .into_iter()
            .map(|(standing, _)| standing)
            .filter(|standing| standing.total_games > 0)
            .map(|mut standing| {
                standing.win_rate = win_rate(standing.wins, standing.total_games);
                standing
            })
            .collect();
        leaderboard.sort_by(rank_overall);
        leaderboard.truncate(limit);

        debug!(entries = leaderboard.len(), "Built overall leaderboard");
        Ok(leaderboard)
    }

    /// Stats for one game (zeroed when the player has not played it) or,
    /// without a game, a map of every game the player has played.
    pub async fn user_stats(
        &self,
        player_id: &str,
        game: Option<&str>,
    ) -> Result<UserStats, StatsServiceError> {
        require_non_empty(player_id, "Player ID")?;

        match game {
            Some(game) => {
                self.ensure_supported(game)?;
                let stats = self
                    .repository
                    .get_stats(player_id, game)
                    .await?
                    .unwrap_or_else(|| PlayerGameStats::empty(player_id, "", game));
                Ok(UserStats::Game(StatsSummary::from(stats)))
            }
            None => {
                let by_game = self
                    .repository
                    .find_stats_for_player(player_id)
                    .await?
                    .into_iter()
                    .map(|stats| (stats.game.clone(), StatsSummary::from(stats)))
                    .collect();
                Ok(UserStats::AllGames(by_game))
            }
        }
    }
}

fn rank_overall(a: &OverallStanding, b: &OverallStanding) -> Ordering {
    b.wins
        .cmp(&a.wins)
        .then_with(|| b.win_rate.total_cmp(&a.win_rate))
}
