use std::sync::Arc;

use api::{create_app, state::AppState};
use lambda_http::{run, Error};
use shared::config::Config;
use shared::repositories::challenge_repository::DynamoDbChallengeRepository;
use shared::repositories::in_memory::{InMemoryChallengeRepository, InMemoryPlayerStatsRepository};
use shared::repositories::stats_repository::DynamoDbPlayerStatsRepository;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Local runs read a .env file; Lambda provides the environment directly
    dotenvy::dotenv().ok();
    std::env::set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;

    // Tables are only configured for the DynamoDB backend
    let state = match &config.tables {
        Some(tables) => {
            let aws_config = aws_config::load_from_env().await;
            let client = aws_sdk_dynamodb::Client::new(&aws_config);
            AppState::new(
                Arc::new(DynamoDbChallengeRepository::new(
                    client.clone(),
                    tables.challenges.as_str(),
                    tables.player_stats.as_str(),
                )),
                Arc::new(DynamoDbPlayerStatsRepository::new(
                    client,
                    tables.player_stats.as_str(),
                )),
                config.supported_games.clone(),
            )
        }
        None => {
            let stats = Arc::new(InMemoryPlayerStatsRepository::new());
            AppState::new(
                Arc::new(InMemoryChallengeRepository::new(stats.clone())),
                stats,
                config.supported_games.clone(),
            )
        }
    };

    info!(
        backend = %config.store_backend,
        games = config.supported_games.as_slice().len(),
        "Starting challenge API"
    );

    run(create_app(state)).await
}
