use std::sync::Arc;

use shared::repositories::challenge_repository::ChallengeRepository;
use shared::repositories::stats_repository::PlayerStatsRepository;
use shared::services::challenge_service::ChallengeService;
use shared::services::stats_service::StatsService;
use shared::models::game::SupportedGames;

#[derive(Clone)]
pub struct AppState {
    pub challenge_service: Arc<ChallengeService>,
    pub stats_service: Arc<StatsService>,
}

impl AppState {
    /// Wires both services over the given stores. The challenge service
    /// shares the stats service so reports land in the same stats store.
    pub fn new(
        challenge_repository: Arc<dyn ChallengeRepository + Send + Sync>,
        stats_repository: Arc<dyn PlayerStatsRepository + Send + Sync>,
        supported_games: SupportedGames,
    ) -> Self {
        let stats_service = Arc::new(StatsService::new(stats_repository, supported_games));
        let challenge_service = Arc::new(ChallengeService::new(
            challenge_repository,
            stats_service.clone(),
        ));

        AppState {
            challenge_service,
            stats_service,
        }
    }
}
