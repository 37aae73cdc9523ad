use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::errors::validation_errors::ValidationError;

/// Where a challenge is in its lifecycle.
///
/// `pending -> accepted -> completed`, or `pending -> cancelled`.
/// `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Accepted => "accepted",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChallengeStatus::Completed | ChallengeStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: ChallengeStatus) -> bool {
        matches!(
            (self, next),
            (ChallengeStatus::Pending, ChallengeStatus::Accepted)
                | (ChallengeStatus::Pending, ChallengeStatus::Cancelled)
                | (ChallengeStatus::Accepted, ChallengeStatus::Completed)
        )
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result as seen by whoever reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

impl GameResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::Win => "win",
            GameResult::Loss => "loss",
            GameResult::Draw => "draw",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameResult {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(GameResult::Win),
            "loss" => Ok(GameResult::Loss),
            "draw" => Ok(GameResult::Draw),
            _ => Err(ValidationError::InvalidResult(value.to_string())),
        }
    }
}

/// A reported result with the winner and loser resolved to player ids.
/// Both ids are `None` for a draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub result: GameResult,
    pub winner_id: Option<String>,
    pub loser_id: Option<String>,
}

/// A match proposed by one player to another over a single game.
///
/// Display names are captured when the challenge is issued and are not
/// refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub challenger_id: String,
    pub challenger_name: String,
    pub opponent_id: String,
    pub opponent_name: String,
    pub game: String,
    pub status: ChallengeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loser_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Challenge {
    pub fn new(
        challenger_id: &str,
        challenger_name: &str,
        opponent_id: &str,
        opponent_name: &str,
        game: &str,
    ) -> Self {
        Challenge {
            id: Uuid::new_v4().to_string(),
            challenger_id: challenger_id.to_string(),
            challenger_name: challenger_name.to_string(),
            opponent_id: opponent_id.to_string(),
            opponent_name: opponent_name.to_string(),
            game: game.to_string(),
            status: ChallengeStatus::Pending,
            result: None,
            winner_id: None,
            loser_id: None,
            created_at: Utc::now(),
            accepted_at: None,
            completed_at: None,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.challenger_id == user_id || self.opponent_id == user_id
    }

    /// The participant facing `user_id`, or `None` if `user_id` is not in
    /// this challenge.
    pub fn other_party(&self, user_id: &str) -> Option<&str> {
        if user_id == self.challenger_id {
            Some(&self.opponent_id)
        } else if user_id == self.opponent_id {
            Some(&self.challenger_id)
        } else {
            None
        }
    }

    /// Display name captured at creation for a participant.
    pub fn name_of(&self, user_id: &str) -> Option<&str> {
        if user_id == self.challenger_id {
            Some(&self.challenger_name)
        } else if user_id == self.opponent_id {
            Some(&self.opponent_name)
        } else {
            None
        }
    }

    /// Works out who won from the reporter's point of view.
    ///
    /// `win` credits the explicit winner if given, else the reporter.
    /// `loss` charges the reporter and credits the explicit winner if given,
    /// else the other participant. `draw` names nobody.
    pub fn resolve_outcome(
        &self,
        reporter_id: &str,
        result: GameResult,
        explicit_winner_id: Option<&str>,
    ) -> Result<Outcome, ValidationError> {
        let reporter_opponent = self
            .other_party(reporter_id)
            .ok_or_else(|| ValidationError::InvalidWinner(reporter_id.to_string()))?;

        let (winner_id, loser_id) = match (result, explicit_winner_id) {
            (GameResult::Draw, _) => (None, None),
            (GameResult::Win, Some(winner)) => {
                let loser = self
                    .other_party(winner)
                    .ok_or_else(|| ValidationError::InvalidWinner(winner.to_string()))?;
                (Some(winner), Some(loser))
            }
            (GameResult::Win, None) => (Some(reporter_id), Some(reporter_opponent)),
            (GameResult::Loss, Some(winner)) => {
                if winner != reporter_opponent {
                    return Err(ValidationError::InvalidWinner(winner.to_string()));
                }
                (Some(winner), Some(reporter_id))
            }
            (GameResult::Loss, None) => (Some(reporter_opponent), Some(reporter_id)),
        };

        Ok(Outcome {
            result,
            winner_id: winner_id.map(str::to_string),
            loser_id: loser_id.map(str::to_string),
        })
    }

    /// The recorded result, once the challenge is completed.
    pub fn outcome(&self) -> Option<Outcome> {
        self.result.map(|result| Outcome {
            result,
            winner_id: self.winner_id.clone(),
            loser_id: self.loser_id.clone(),
        })
    }

    pub fn accept(&mut self, at: DateTime<Utc>) {
        self.status = ChallengeStatus::Accepted;
        self.accepted_at = Some(at);
    }

    pub fn complete(&mut self, outcome: &Outcome, at: DateTime<Utc>) {
        self.status = ChallengeStatus::Completed;
        self.result = Some(outcome.result);
        self.winner_id = outcome.winner_id.clone();
        self.loser_id = outcome.loser_id.clone();
        self.completed_at = Some(at);
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) {
        self.status = ChallengeStatus::Cancelled;
        self.completed_at = Some(at);
    }
}
