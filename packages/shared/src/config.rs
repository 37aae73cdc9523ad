use std::env;
use std::fmt;
use std::str::FromStr;

use crate::models::game::SupportedGames;

pub const STORE_BACKEND_VAR: &str = "STORE_BACKEND";
pub const CHALLENGES_TABLE_VAR: &str = "CHALLENGES_TABLE";
pub const PLAYER_STATS_TABLE_VAR: &str = "PLAYER_STATS_TABLE";
pub const SUPPORTED_GAMES_VAR: &str = "SUPPORTED_GAMES";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set when using the DynamoDB store")]
    MissingVar(&'static str),
    #[error("Unknown store backend '{0}', expected 'dynamodb' or 'memory'")]
    UnknownBackend(String),
    #[error("{0} does not name any game")]
    NoGames(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    DynamoDb,
    InMemory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(StoreBackend::DynamoDb),
            "memory" | "in-memory" | "inmemory" => Ok(StoreBackend::InMemory),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::DynamoDb => write!(f, "dynamodb"),
            StoreBackend::InMemory => write!(f, "memory"),
        }
    }
}

/// Table names for the DynamoDB store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub challenges: String,
    pub player_stats: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store_backend: StoreBackend,
    /// Present whenever `store_backend` is `DynamoDb`.
    pub tables: Option<Tables>,
    pub supported_games: SupportedGames,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let store_backend = match var(STORE_BACKEND_VAR) {
            Some(value) => value.parse()?,
            None => StoreBackend::default(),
        };

        let tables = match store_backend {
            StoreBackend::DynamoDb => Some(Tables {
                challenges: var(CHALLENGES_TABLE_VAR)
                    .ok_or(ConfigError::MissingVar(CHALLENGES_TABLE_VAR))?,
                player_stats: var(PLAYER_STATS_TABLE_VAR)
                    .ok_or(ConfigError::MissingVar(PLAYER_STATS_TABLE_VAR))?,
            }),
            StoreBackend::InMemory => None,
        };

        let supported_games = match var(SUPPORTED_GAMES_VAR) {
            Some(value) => {
                let games = SupportedGames::from_csv(&value);
                if games.is_empty() {
                    return Err(ConfigError::NoGames(SUPPORTED_GAMES_VAR));
                }
                games
            }
            None => SupportedGames::default(),
        };

        Ok(Config {
            store_backend,
            tables,
            supported_games,
        })
    }
}
