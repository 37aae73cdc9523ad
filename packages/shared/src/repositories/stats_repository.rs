use std::collections::HashMap;

use crate::models::stats::{PlayerGameStats, StatsDelta};
use crate::repositories::errors::stats_repository_errors::StatsRepositoryError;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value};

#[cfg(test)]
use mockall::automock;

/// GSI keyed by (`game`, `wins`), projecting all attributes.
pub const STATS_BY_GAME_INDEX: &str = "GSI_StatsByGame";

type Item = HashMap<String, AttributeValue>;

/// ADD creates missing counters at zero, so first and later games take the
/// same path.
pub(crate) const INCREMENT_EXPRESSION: &str =
    "ADD #wins :wins, #losses :losses, #draws :draws, #total_games :one \
     SET #player_name = :player_name, #updated_at = :updated_at";

pub(crate) fn stats_key(player_id: &str, game: &str) -> Item {
    HashMap::from([
        ("player_id".to_string(), AttributeValue::S(player_id.to_string())),
        ("game".to_string(), AttributeValue::S(game.to_string())),
    ])
}

pub(crate) fn increment_names() -> HashMap<String, String> {
    [
        "wins",
        "losses",
        "draws",
        "total_games",
        "player_name",
        "updated_at",
    ]
    .into_iter()
    .map(|name| (format!("#{}", name), name.to_string()))
    .collect()
}

pub(crate) fn increment_values(
    player_name: &str,
    delta: StatsDelta,
    updated_at: DateTime<Utc>,
) -> Result<Item, StatsRepositoryError> {
    let updated_at = to_attribute_value(updated_at)
        .map_err(|e| StatsRepositoryError::Serialization(e.to_string()))?;

    Ok(HashMap::from([
        (":wins".to_string(), AttributeValue::N(delta.wins.to_string())),
        (":losses".to_string(), AttributeValue::N(delta.losses.to_string())),
        (":draws".to_string(), AttributeValue::N(delta.draws.to_string())),
        (":one".to_string(), AttributeValue::N("1".to_string())),
        (":player_name".to_string(), AttributeValue::S(player_name.to_string())),
        (":updated_at".to_string(), updated_at),
    ]))
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlayerStatsRepository: Send + Sync {
    /// Adds `delta` and one game to the (`player_id`, `game`) record,
    /// creating it when absent, and refreshes the stored display name.
    async fn increment_stats(
        &self,
        player_id: &str,
        player_name: &str,
        game: &str,
        delta: StatsDelta,
    ) -> Result<(), StatsRepositoryError>;

    async fn get_stats(
        &self,
        player_id: &str,
        game: &str,
    ) -> Result<Option<PlayerGameStats>, StatsRepositoryError>;

    async fn find_stats_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<PlayerGameStats>, StatsRepositoryError>;

    async fn find_stats_for_game(
        &self,
        game: &str,
    ) -> Result<Vec<PlayerGameStats>, StatsRepositoryError>;

    async fn list_all_stats(&self) -> Result<Vec<PlayerGameStats>, StatsRepositoryError>;
}

pub struct DynamoDbPlayerStatsRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbPlayerStatsRepository {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

fn decode_items(
    items: Option<Vec<Item>>,
    stats: &mut Vec<PlayerGameStats>,
) -> Result<(), StatsRepositoryError> {
    for item in items.unwrap_or_default() {
        let record: PlayerGameStats =
            from_item(item).map_err(|e| StatsRepositoryError::Serialization(e.to_string()))?;
        stats.push(record);
    }
    Ok(())
}

fn next_page(last_evaluated_key: Option<Item>) -> Option<Item> {
    last_evaluated_key.filter(|key| !key.is_empty())
}

#[async_trait]
impl PlayerStatsRepository for DynamoDbPlayerStatsRepository {
    async fn increment_stats(
        &self,
        player_id: &str,
        player_name: &str,
        game: &str,
        delta: StatsDelta,
    ) -> Result<(), StatsRepositoryError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(stats_key(player_id, game)))
            .update_expression(INCREMENT_EXPRESSION)
            .set_expression_attribute_names(Some(increment_names()))
            .set_expression_attribute_values(Some(increment_values(
                player_name,
                delta,
                Utc::now(),
            )?))
            .send()
            .await
            .map_err(|e| StatsRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get_stats(
        &self,
        player_id: &str,
        game: &str,
    ) -> Result<Option<PlayerGameStats>, StatsRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(stats_key(player_id, game)))
            .send()
            .await
            .map_err(|e| StatsRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            let stats: PlayerGameStats = from_item(item)
                .map_err(|e| StatsRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(stats))
        } else {
            Ok(None)
        }
    }

    async fn find_stats_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<PlayerGameStats>, StatsRepositoryError> {
        let mut stats = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#player_id = :player_id")
                .expression_attribute_names("#player_id", "player_id")
                .expression_attribute_values(":player_id", AttributeValue::S(player_id.to_string()))
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await
                .map_err(|e| StatsRepositoryError::DynamoDb(e.to_string()))?;

            decode_items(output.items, &mut stats)?;
            exclusive_start_key = next_page(output.last_evaluated_key);
            if exclusive_start_key.is_none() {
                break;
            }
        }

        Ok(stats)
    }

    async fn find_stats_for_game(
        &self,
        game: &str,
    ) -> Result<Vec<PlayerGameStats>, StatsRepositoryError> {
        let mut stats = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(STATS_BY_GAME_INDEX)
                .key_condition_expression("#game = :game")
                .expression_attribute_names("#game", "game")
                .expression_attribute_values(":game", AttributeValue::S(game.to_string()))
                .scan_index_forward(false)
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await
                .map_err(|e| StatsRepositoryError::DynamoDb(e.to_string()))?;

            decode_items(output.items, &mut stats)?;
            exclusive_start_key = next_page(output.last_evaluated_key);
            if exclusive_start_key.is_none() {
                break;
            }
        }

        Ok(stats)
    }

    async fn list_all_stats(&self) -> Result<Vec<PlayerGameStats>, StatsRepositoryError> {
        let mut stats = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await
                .map_err(|e| StatsRepositoryError::DynamoDb(e.to_string()))?;

            decode_items(output.items, &mut stats)?;
            exclusive_start_key = next_page(output.last_evaluated_key);
            if exclusive_start_key.is_none() {
                break;
            }
        }

        Ok(stats)
    }
}
