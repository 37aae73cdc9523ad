use crate::models::challenge::{Challenge, ChallengeStatus};
use crate::models::stats::StatsIncrement;
use crate::repositories::errors::challenge_repository_errors::ChallengeRepositoryError;
use crate::repositories::stats_repository::{
    increment_names, increment_values, stats_key, INCREMENT_EXPRESSION,
};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client;
use chrono::Utc;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};

#[cfg(test)]
use mockall::automock;

/// GSI keyed by (`challenger_id`, `status`), projecting all attributes.
pub const CHALLENGES_BY_CHALLENGER_INDEX: &str = "GSI_ChallengesByChallenger";
/// GSI keyed by (`opponent_id`, `status`), projecting all attributes.
pub const CHALLENGES_BY_OPPONENT_INDEX: &str = "GSI_ChallengesByOpponent";

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    async fn create_challenge(&self, challenge: &Challenge)
        -> Result<(), ChallengeRepositoryError>;

    async fn get_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<Challenge>, ChallengeRepositoryError>;

    /// Replaces the stored challenge only if it exists and its status is
    /// still `expected`. Returns `false` when that condition does not hold.
    async fn update_challenge_if_status(
        &self,
        challenge: &Challenge,
        expected: ChallengeStatus,
    ) -> Result<bool, ChallengeRepositoryError>;

    /// Writes a completed challenge and its players' stats increments as one
    /// unit: either all of them land or none do. Like
    /// `update_challenge_if_status`, returns `false` without writing anything
    /// when the stored status is no longer `expected`.
    async fn complete_challenge(
        &self,
        challenge: &Challenge,
        expected: ChallengeStatus,
        increments: &[StatsIncrement],
    ) -> Result<bool, ChallengeRepositoryError>;

    /// Challenges in `status` where `user_id` is the challenger or the opponent.
    async fn find_challenges_for_user(
        &self,
        user_id: &str,
        status: ChallengeStatus,
    ) -> Result<Vec<Challenge>, ChallengeRepositoryError>;
}

pub struct DynamoDbChallengeRepository {
    pub client: Client,
    pub table_name: String,
    /// Player stats table, written in the same transaction as completions.
    pub stats_table_name: String,
}

impl DynamoDbChallengeRepository {
    pub fn new(
        client: Client,
        table_name: impl Into<String>,
        stats_table_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            stats_table_name: stats_table_name.into(),
        }
    }

    fn status_guarded_put(
        &self,
        challenge: &Challenge,
        expected: ChallengeStatus,
    ) -> Result<Put, ChallengeRepositoryError> {
        let item = to_item(challenge)
            .map_err(|e| ChallengeRepositoryError::Serialization(e.to_string()))?;

        Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("#status = :expected")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":expected",
                AttributeValue::S(expected.as_str().to_string()),
            )
            .build()
            .map_err(|e| ChallengeRepositoryError::DynamoDb(e.to_string()))
    }

    fn stats_update(&self, increment: &StatsIncrement) -> Result<Update, ChallengeRepositoryError> {
        Update::builder()
            .table_name(&self.stats_table_name)
            .set_key(Some(stats_key(&increment.player_id, &increment.game)))
            .update_expression(INCREMENT_EXPRESSION)
            .set_expression_attribute_names(Some(increment_names()))
            .set_expression_attribute_values(Some(increment_values(
                &increment.player_name,
                increment.delta,
                Utc::now(),
            )?))
            .build()
            .map_err(|e| ChallengeRepositoryError::DynamoDb(e.to_string()))
    }

    async fn query_index(
        &self,
        index_name: &str,
        user_attribute: &str,
        user_id: &str,
        status: ChallengeStatus,
    ) -> Result<Vec<Challenge>, ChallengeRepositoryError> {
        let mut challenges = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index_name)
                .key_condition_expression(format!(
                    "{} = :user_id AND #status = :status",
                    user_attribute
                ))
                .expression_attribute_names("#status", "status")
                .expression_attribute_values(":user_id", AttributeValue::S(user_id.to_string()))
                .expression_attribute_values(
                    ":status",
                    AttributeValue::S(status.as_str().to_string()),
                )
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await
                .map_err(|e| ChallengeRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let challenge: Challenge = from_item(item)
                    .map_err(|e| ChallengeRepositoryError::Serialization(e.to_string()))?;
                challenges.push(challenge);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        Ok(challenges)
    }
}

#[async_trait]
impl ChallengeRepository for DynamoDbChallengeRepository {
    async fn create_challenge(
        &self,
        challenge: &Challenge,
    ) -> Result<(), ChallengeRepositoryError> {
        let item = to_item(challenge)
            .map_err(|e| ChallengeRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|e| ChallengeRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<Challenge>, ChallengeRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(challenge_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| ChallengeRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            let challenge: Challenge = from_item(item)
                .map_err(|e| ChallengeRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(challenge))
        } else {
            Ok(None)
        }
    }

    async fn update_challenge_if_status(
        &self,
        challenge: &Challenge,
        expected: ChallengeStatus,
    ) -> Result<bool, ChallengeRepositoryError> {
        let item = to_item(challenge)
            .map_err(|e| ChallengeRepositoryError::Serialization(e.to_string()))?;

        // "status" is a DynamoDB reserved word
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("#status = :expected")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":expected",
                AttributeValue::S(expected.as_str().to_string()),
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Ok(false);
                    }
                }
                Err(ChallengeRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn complete_challenge(
        &self,
        challenge: &Challenge,
        expected: ChallengeStatus,
        increments: &[StatsIncrement],
    ) -> Result<bool, ChallengeRepositoryError> {
        let mut transact_items = vec![TransactWriteItem::builder()
            .put(self.status_guarded_put(challenge, expected)?)
            .build()];
        for increment in increments {
            transact_items.push(
                TransactWriteItem::builder()
                    .update(self.stats_update(increment)?)
                    .build(),
            );
        }

        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(transact_items))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                // Only the challenge put carries a condition, and it is first
                if let SdkError::ServiceError(service_err) = &e {
                    if let TransactWriteItemsError::TransactionCanceledException(cancelled) =
                        service_err.err()
                    {
                        let condition_failed = cancelled
                            .cancellation_reasons()
                            .first()
                            .and_then(|reason| reason.code())
                            == Some("ConditionalCheckFailed");
                        if condition_failed {
                            return Ok(false);
                        }
                    }
                }
                Err(ChallengeRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn find_challenges_for_user(
        &self,
        user_id: &str,
        status: ChallengeStatus,
    ) -> Result<Vec<Challenge>, ChallengeRepositoryError> {
        let mut challenges = self
            .query_index(CHALLENGES_BY_CHALLENGER_INDEX, "challenger_id", user_id, status)
            .await?;
        let received = self
            .query_index(CHALLENGES_BY_OPPONENT_INDEX, "opponent_id", user_id, status)
            .await?;
        challenges.extend(received);

        Ok(challenges)
    }
}
