use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::challenge::{Challenge, GameResult, Outcome};

/// Percentage of games won, rounded to one decimal place with ties going to
/// the even digit (1 of 16 is 6.2). Zero when no games have been played.
pub fn win_rate(wins: u32, total_games: u32) -> f64 {
    if total_games == 0 {
        return 0.0;
    }
    let rate = f64::from(wins) / f64::from(total_games) * 100.0;
    (rate * 10.0).round_ties_even() / 10.0
}

/// Win/loss/draw counters for one player in one game.
///
/// Stored under the (`player_id`, `game`) key. Created on the player's first
/// completed challenge in that game and only ever incremented afterwards;
/// `player_name` is refreshed on every increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameStats {
    pub player_id: String,
    pub player_name: String,
    pub game: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
    pub updated_at: DateTime<Utc>,
}

impl PlayerGameStats {
    /// A record for a player who has not finished a game yet.
    pub fn empty(player_id: &str, player_name: &str, game: &str) -> Self {
        PlayerGameStats {
            player_id: player_id.to_string(),
            player_name: player_name.to_string(),
            game: game.to_string(),
            wins: 0,
            losses: 0,
            draws: 0,
            total_games: 0,
            updated_at: Utc::now(),
        }
    }

    /// Adds one finished game to the counters.
    pub fn apply(&mut self, player_name: &str, delta: StatsDelta, at: DateTime<Utc>) {
        self.player_name = player_name.to_string();
        self.wins += delta.wins;
        self.losses += delta.losses;
        self.draws += delta.draws;
        self.total_games += 1;
        self.updated_at = at;
    }

    pub fn win_rate(&self) -> f64 {
        win_rate(self.wins, self.total_games)
    }
}

/// What one completed challenge adds to one player's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsDelta {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl StatsDelta {
    pub const WIN: StatsDelta = StatsDelta {
        wins: 1,
        losses: 0,
        draws: 0,
    };
    pub const LOSS: StatsDelta = StatsDelta {
        wins: 0,
        losses: 1,
        draws: 0,
    };
    pub const DRAW: StatsDelta = StatsDelta {
        wins: 0,
        losses: 0,
        draws: 1,
    };
}

/// One player's share of a completed challenge, ready to be written to the
/// stats store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsIncrement {
    pub player_id: String,
    pub player_name: String,
    pub game: String,
    pub delta: StatsDelta,
}

impl StatsIncrement {
    /// A draw for both sides, or a win for the winner and a loss for the
    /// loser. Names are the ones captured on the challenge.
    pub fn for_outcome(challenge: &Challenge, outcome: &Outcome) -> Vec<StatsIncrement> {
        let deltas: Vec<(&str, StatsDelta)> = match outcome.result {
            GameResult::Draw => vec![
                (challenge.challenger_id.as_str(), StatsDelta::DRAW),
                (challenge.opponent_id.as_str(), StatsDelta::DRAW),
            ],
            GameResult::Win | GameResult::Loss => outcome
                .winner_id
                .iter()
                .map(|id| (id.as_str(), StatsDelta::WIN))
                .chain(
                    outcome
                        .loser_id
                        .iter()
                        .map(|id| (id.as_str(), StatsDelta::LOSS)),
                )
                .collect(),
        };

        deltas
            .into_iter()
            .map(|(player_id, delta)| StatsIncrement {
                player_id: player_id.to_string(),
                player_name: challenge.name_of(player_id).unwrap_or(player_id).to_string(),
                game: challenge.game.clone(),
                delta,
            })
            .collect()
    }
}

/// A player's record in one game together with their win rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub player_id: String,
    pub player_name: String,
    pub game: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
    pub win_rate: f64,
}

impl From<PlayerGameStats> for StatsSummary {
    fn from(stats: PlayerGameStats) -> Self {
        let win_rate = stats.win_rate();
        StatsSummary {
            player_id: stats.player_id,
            player_name: stats.player_name,
            game: stats.game,
            wins: stats.wins,
            losses: stats.losses,
            draws: stats.draws,
            total_games: stats.total_games,
            win_rate,
        }
    }
}

/// Per-game counters inside an [`OverallStanding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameBreakdown {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
}

/// A player's results summed over every game they have played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStanding {
    pub player_id: String,
    pub player_name: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
    pub win_rate: f64,
    pub games: BTreeMap<String, GameBreakdown>,
}

/// Stats requested for a player: one game, or every game they have played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserStats {
    Game(StatsSummary),
    AllGames(BTreeMap<String, StatsSummary>),
}
