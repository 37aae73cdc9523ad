use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::models::challenge::{Challenge, ChallengeStatus, GameResult};
use crate::models::stats::StatsIncrement;
use crate::repositories::challenge_repository::ChallengeRepository;
use crate::repositories::errors::challenge_repository_errors::ChallengeRepositoryError;
use crate::services::errors::challenge_service_errors::ChallengeServiceError;
use crate::services::errors::validation_errors::{require_non_empty, ValidationError};
use crate::services::stats_service::StatsService;

/// Conditional writes attempted before a transition gives up as a conflict.
const MAX_WRITE_ATTEMPTS: usize = 2;

/// Why a lifecycle transition was refused. Nothing is written when a
/// transition is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TransitionRejection {
    NotFound,
    NotAuthorized,
    WrongState { current: ChallengeStatus },
    /// The challenge kept changing underneath the request.
    Conflict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied(Challenge),
    Rejected(TransitionRejection),
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        match self {
            Transition::Applied(challenge) => Some(challenge),
            Transition::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<TransitionRejection> {
        match self {
            Transition::Applied(_) => None,
            Transition::Rejected(rejection) => Some(*rejection),
        }
    }
}

impl From<Transition> for bool {
    fn from(transition: Transition) -> Self {
        transition.is_applied()
    }
}

/// A user's open challenges: waiting for acceptance, and accepted but not
/// yet reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeList {
    pub pending: Vec<Challenge>,
    pub active: Vec<Challenge>,
}

enum Refusal {
    Rejected(TransitionRejection),
    Invalid(ValidationError),
}

impl From<TransitionRejection> for Refusal {
    fn from(rejection: TransitionRejection) -> Self {
        Refusal::Rejected(rejection)
    }
}

impl From<ValidationError> for Refusal {
    fn from(error: ValidationError) -> Self {
        Refusal::Invalid(error)
    }
}

fn require_transition(challenge: &Challenge, next: ChallengeStatus) -> Result<(), Refusal> {
    if challenge.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(TransitionRejection::WrongState {
            current: challenge.status,
        }
        .into())
    }
}

/// Drives challenges through `pending -> accepted -> completed` or
/// `pending -> cancelled`, and hands completed results to the stats service.
#[derive(Clone)]
pub struct ChallengeService {
    repository: Arc<dyn ChallengeRepository + Send + Sync>,
    stats_service: Arc<StatsService>,
}

impl ChallengeService {
    pub fn new(
        repository: Arc<dyn ChallengeRepository + Send + Sync>,
        stats_service: Arc<StatsService>,
    ) -> Self {
        ChallengeService {
            repository,
            stats_service,
        }
    }

    pub async fn create_challenge(
        &self,
        challenger_id: &str,
        challenger_name: &str,
        opponent_id: &str,
        opponent_name: &str,
        game: &str,
    ) -> Result<Challenge, ChallengeServiceError> {
        require_non_empty(challenger_id, "Challenger ID")?;
        require_non_empty(opponent_id, "Opponent ID")?;
        if challenger_id == opponent_id {
            return Err(ValidationError::InvalidOpponent.into());
        }
        if !self.stats_service.supported_games().contains(game) {
            return Err(ValidationError::UnsupportedGame(game.to_string()).into());
        }

        let challenge = Challenge::new(
            challenger_id,
            challenger_name,
            opponent_id,
            opponent_name,
            game,
        );
        self.repository.create_challenge(&challenge).await?;

        info!(
            challenge_id = %challenge.id,
            challenger_id,
            opponent_id,
            game,
            "Challenge created"
        );
        Ok(challenge)
    }

    pub async fn get_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<Challenge>, ChallengeServiceError> {
        Ok(self.repository.get_challenge(challenge_id).await?)
    }

    /// Only the challenged player may accept, and only while pending.
    pub async fn accept_challenge(
        &self,
        challenge_id: &str,
        actor_id: &str,
    ) -> Result<Transition, ChallengeServiceError> {
        let transition = self
            .apply_transition(challenge_id, |challenge| {
                if challenge.opponent_id != actor_id {
                    return Err(TransitionRejection::NotAuthorized.into());
                }
                require_transition(challenge, ChallengeStatus::Accepted)?;

                let mut accepted = challenge.clone();
                accepted.accept(Utc::now());
                Ok(accepted)
            })
            .await?;

        log_transition("accept", challenge_id, actor_id, &transition);
        Ok(transition)
    }

    /// Either participant may report once the challenge is accepted. The
    /// completed challenge and both players' stats increments for the
    /// challenge's game are written together, so a failed write leaves the
    /// challenge accepted and the report can simply be sent again.
    pub async fn report_result(
        &self,
        challenge_id: &str,
        reporter_id: &str,
        result: GameResult,
        explicit_winner_id: Option<&str>,
    ) -> Result<Transition, ChallengeServiceError> {
        let transition = self
            .apply_transition(challenge_id, |challenge| {
                if !challenge.is_participant(reporter_id) {
                    return Err(TransitionRejection::NotAuthorized.into());
                }
                require_transition(challenge, ChallengeStatus::Completed)?;

                let outcome = challenge.resolve_outcome(reporter_id, result, explicit_winner_id)?;
                let mut completed = challenge.clone();
                completed.complete(&outcome, Utc::now());
                Ok(completed)
            })
            .await?;

        log_transition("report", challenge_id, reporter_id, &transition);
        Ok(transition)
    }

    /// Only the challenger may cancel, and only while pending.
    pub async fn cancel_challenge(
        &self,
        challenge_id: &str,
        actor_id: &str,
    ) -> Result<Transition, ChallengeServiceError> {
        let transition = self
            .apply_transition(challenge_id, |challenge| {
                if challenge.challenger_id != actor_id {
                    return Err(TransitionRejection::NotAuthorized.into());
                }
                require_transition(challenge, ChallengeStatus::Cancelled)?;

                let mut cancelled = challenge.clone();
                cancelled.cancel(Utc::now());
                Ok(cancelled)
            })
            .await?;

        log_transition("cancel", challenge_id, actor_id, &transition);
        Ok(transition)
    }

    pub async fn list_pending(&self, user_id: &str) -> Result<Vec<Challenge>, ChallengeServiceError> {
        Ok(self
            .repository
            .find_challenges_for_user(user_id, ChallengeStatus::Pending)
            .await?)
    }

    pub async fn list_active(&self, user_id: &str) -> Result<Vec<Challenge>, ChallengeServiceError> {
        Ok(self
            .repository
            .find_challenges_for_user(user_id, ChallengeStatus::Accepted)
            .await?)
    }

    pub async fn list_challenges(&self, user_id: &str) -> Result<ChallengeList, ChallengeServiceError> {
        require_non_empty(user_id, "User ID")?;
        let pending = self.list_pending(user_id).await?;
        let active = self.list_active(user_id).await?;
        debug!(
            user_id,
            pending = pending.len(),
            active = active.len(),
            "Listed challenges"
        );
        Ok(ChallengeList { pending, active })
    }

    /// Reads the challenge, lets `plan` check preconditions and build the
    /// next version, then writes it only if the stored status is unchanged.
    /// A lost race is retried once from a fresh read.
    async fn apply_transition<F>(
        &self,
        challenge_id: &str,
        mut plan: F,
    ) -> Result<Transition, ChallengeServiceError>
    where
        F: FnMut(&Challenge) -> Result<Challenge, Refusal> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(current) = self.repository.get_challenge(challenge_id).await? else {
                return Ok(Transition::Rejected(TransitionRejection::NotFound));
            };

            let next = match plan(&current) {
                Ok(next) => next,
                Err(Refusal::Rejected(rejection)) => return Ok(Transition::Rejected(rejection)),
                Err(Refusal::Invalid(error)) => return Err(error.into()),
            };

            let written = self.write(&next, current.status).await.map_err(|e| {
                error!(challenge_id, error = %e, "Challenge write failed");
                e
            })?;
            if written {
                return Ok(Transition::Applied(next));
            }

            warn!(
                challenge_id,
                attempt,
                expected_status = %current.status,
                "Challenge changed during update"
            );
        }

        Ok(Transition::Rejected(TransitionRejection::Conflict))
    }

    /// Completions carry their stats increments in the same write.
    async fn write(
        &self,
        next: &Challenge,
        expected: ChallengeStatus,
    ) -> Result<bool, ChallengeRepositoryError> {
        match next.outcome() {
            Some(outcome) if next.status == ChallengeStatus::Completed => {
                let increments = StatsIncrement::for_outcome(next, &outcome);
                self.repository
                    .complete_challenge(next, expected, &increments)
                    .await
            }
            _ => self.repository.update_challenge_if_status(next, expected).await,
        }
    }
}

fn log_transition(action: &str, challenge_id: &str, actor_id: &str, transition: &Transition) {
    match transition {
        Transition::Applied(challenge) => info!(
            challenge_id,
            actor_id,
            action,
            status = %challenge.status,
            "Challenge transition applied"
        ),
        Transition::Rejected(rejection) => debug!(
            challenge_id,
            actor_id,
            action,
            ?rejection,
            "Challenge transition rejected"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::SupportedGames;
    use crate::repositories::challenge_repository::MockChallengeRepository;
    use crate::models::stats::StatsDelta;
    use crate::repositories::in_memory::{InMemoryChallengeRepository, InMemoryPlayerStatsRepository};
    use crate::repositories::stats_repository::{MockPlayerStatsRepository, PlayerStatsRepository};
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const GAME: &str = "Battlegroup Clash Baltics";

    struct Fixture {
        service: ChallengeService,
        challenges: Arc<InMemoryChallengeRepository>,
        stats: Arc<InMemoryPlayerStatsRepository>,
    }

    fn fixture() -> Fixture {
        let stats = Arc::new(InMemoryPlayerStatsRepository::new());
        let challenges = Arc::new(InMemoryChallengeRepository::new(stats.clone()));
        let stats_service = Arc::new(StatsService::new(stats.clone(), SupportedGames::default()));
        let service = ChallengeService::new(challenges.clone(), stats_service);
        Fixture {
            service,
            challenges,
            stats,
        }
    }

    impl Fixture {
        async fn pending(&self) -> Challenge {
            self.service
                .create_challenge("alice", "Alice", "bob", "Bob", GAME)
                .await
                .unwrap()
        }

        async fn accepted(&self) -> Challenge {
            let challenge = self.pending().await;
            self.service
                .accept_challenge(&challenge.id, "bob")
                .await
                .unwrap()
                .challenge()
                .cloned()
                .unwrap()
        }

        async fn stored(&self, challenge_id: &str) -> Challenge {
            self.challenges
                .get_challenge(challenge_id)
                .await
                .unwrap()
                .unwrap()
        }

        async fn counters(&self, player_id: &str) -> Option<(u32, u32, u32, u32)> {
            self.stats
                .get_stats(player_id, GAME)
                .await
                .unwrap()
                .map(|s| (s.wins, s.losses, s.draws, s.total_games))
        }
    }

    #[tokio::test]
    async fn test_create_challenge_starts_pending() {
        let fixture = fixture();

        let challenge = fixture.pending().await;

        let stored = fixture.stored(&challenge.id).await;
        assert_eq!(stored.status, ChallengeStatus::Pending);
        assert_eq!(stored.challenger_id, "alice");
        assert_eq!(stored.opponent_id, "bob");
        assert_eq!(stored.game, GAME);
    }

    #[tokio::test]
    async fn test_create_challenge_rejects_self_challenge() {
        let fixture = fixture();

        let result = fixture
            .service
            .create_challenge("alice", "Alice", "alice", "Alice", GAME)
            .await;

        assert!(matches!(
            result,
            Err(ChallengeServiceError::Validation(ValidationError::InvalidOpponent))
        ));
    }

    #[tokio::test]
    async fn test_create_challenge_rejects_unsupported_game() {
        let fixture = fixture();

        let result = fixture
            .service
            .create_challenge("alice", "Alice", "bob", "Bob", "Chess")
            .await;

        assert!(matches!(
            result,
            Err(ChallengeServiceError::Validation(ValidationError::UnsupportedGame(game))) if game == "Chess"
        ));
    }

    #[tokio::test]
    async fn test_create_challenge_rejects_empty_ids() {
        let fixture = fixture();

        let result = fixture
            .service
            .create_challenge("", "Alice", "bob", "Bob", GAME)
            .await;

        assert!(matches!(
            result,
            Err(ChallengeServiceError::Validation(ValidationError::EmptyIdentifier(_)))
        ));
    }

    #[tokio::test]
    async fn test_accept_by_opponent() {
        let fixture = fixture();
        let challenge = fixture.pending().await;

        let transition = fixture
            .service
            .accept_challenge(&challenge.id, "bob")
            .await
            .unwrap();

        assert!(transition.is_applied());
        let stored = fixture.stored(&challenge.id).await;
        assert_eq!(stored.status, ChallengeStatus::Accepted);
        assert!(stored.accepted_at.is_some());
    }

    #[tokio::test]
    async fn test_accept_by_anyone_else_is_refused() {
        let fixture = fixture();
        let challenge = fixture.pending().await;

        for actor in ["alice", "carol"] {
            let transition = fixture
                .service
                .accept_challenge(&challenge.id, actor)
                .await
                .unwrap();
            assert_eq!(
                transition,
                Transition::Rejected(TransitionRejection::NotAuthorized)
            );
            assert!(!bool::from(transition));
        }
        assert_eq!(
            fixture.stored(&challenge.id).await.status,
            ChallengeStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_accept_twice_is_refused() {
        let fixture = fixture();
        let challenge = fixture.accepted().await;

        let transition = fixture
            .service
            .accept_challenge(&challenge.id, "bob")
            .await
            .unwrap();

        assert_eq!(
            transition.rejection(),
            Some(TransitionRejection::WrongState {
                current: ChallengeStatus::Accepted
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_challenge_is_not_found() {
        let fixture = fixture();

        let accept = fixture.service.accept_challenge("missing", "bob").await.unwrap();
        let cancel = fixture.service.cancel_challenge("missing", "alice").await.unwrap();
        let report = fixture
            .service
            .report_result("missing", "alice", GameResult::Win, None)
            .await
            .unwrap();

        for transition in [accept, cancel, report] {
            assert_eq!(transition.rejection(), Some(TransitionRejection::NotFound));
        }
    }

    #[tokio::test]
    async fn test_report_draw_counts_once_for_both() {
        let fixture = fixture();
        let challenge = fixture.accepted().await;

        let first = fixture
            .service
            .report_result(&challenge.id, "alice", GameResult::Draw, None)
            .await
            .unwrap();
        let second = fixture
            .service
            .report_result(&challenge.id, "bob", GameResult::Draw, None)
            .await
            .unwrap();

        assert!(first.is_applied());
        assert_eq!(
            second.rejection(),
            Some(TransitionRejection::WrongState {
                current: ChallengeStatus::Completed
            })
        );
        let stored = fixture.stored(&challenge.id).await;
        assert_eq!(stored.status, ChallengeStatus::Completed);
        assert_eq!(stored.result, Some(GameResult::Draw));
        assert!(stored.winner_id.is_none());
        assert!(stored.loser_id.is_none());
        assert!(stored.completed_at.is_some());
        assert_eq!(fixture.counters("alice").await, Some((0, 0, 1, 1)));
        assert_eq!(fixture.counters("bob").await, Some((0, 0, 1, 1)));
    }

    #[tokio::test]
    async fn test_report_win_by_opponent_without_explicit_winner() {
        let fixture = fixture();
        let challenge = fixture.accepted().await;

        let transition = fixture
            .service
            .report_result(&challenge.id, "bob", GameResult::Win, None)
            .await
            .unwrap();

        let completed = transition.challenge().unwrap();
        assert_eq!(completed.winner_id.as_deref(), Some("bob"));
        assert_eq!(completed.loser_id.as_deref(), Some("alice"));
        assert_eq!(fixture.counters("bob").await, Some((1, 0, 0, 1)));
        assert_eq!(fixture.counters("alice").await, Some((0, 1, 0, 1)));
    }

    #[rstest]
    #[case::loss_by_challenger("alice", GameResult::Loss, None, "bob", "alice")]
    #[case::loss_with_explicit_winner("bob", GameResult::Loss, Some("alice"), "alice", "bob")]
    #[case::win_with_explicit_winner("bob", GameResult::Win, Some("alice"), "alice", "bob")]
    #[tokio::test]
    async fn test_report_resolves_winner_and_loser(
        #[case] reporter: &str,
        #[case] result: GameResult,
        #[case] explicit: Option<&str>,
        #[case] winner: &str,
        #[case] loser: &str,
    ) {
        let fixture = fixture();
        let challenge = fixture.accepted().await;

        let transition = fixture
            .service
            .report_result(&challenge.id, reporter, result, explicit)
            .await
            .unwrap();

        assert!(transition.is_applied());
        let stored = fixture.stored(&challenge.id).await;
        assert_eq!(stored.winner_id.as_deref(), Some(winner));
        assert_eq!(stored.loser_id.as_deref(), Some(loser));
        assert_eq!(fixture.counters(winner).await, Some((1, 0, 0, 1)));
        assert_eq!(fixture.counters(loser).await, Some((0, 1, 0, 1)));
    }

    #[tokio::test]
    async fn test_report_by_outsider_is_refused() {
        let fixture = fixture();
        let challenge = fixture.accepted().await;

        let transition = fixture
            .service
            .report_result(&challenge.id, "carol", GameResult::Win, None)
            .await
            .unwrap();

        assert_eq!(transition.rejection(), Some(TransitionRejection::NotAuthorized));
        assert_eq!(fixture.counters("carol").await, None);
    }

    #[tokio::test]
    async fn test_report_on_pending_challenge_is_refused() {
        let fixture = fixture();
        let challenge = fixture.pending().await;

        let transition = fixture
            .service
            .report_result(&challenge.id, "alice", GameResult::Win, None)
            .await
            .unwrap();

        assert_eq!(
            transition.rejection(),
            Some(TransitionRejection::WrongState {
                current: ChallengeStatus::Pending
            })
        );
        assert_eq!(fixture.counters("alice").await, None);
    }

    #[tokio::test]
    async fn test_report_with_outsider_winner_is_invalid_and_writes_nothing() {
        let fixture = fixture();
        let challenge = fixture.accepted().await;

        let result = fixture
            .service
            .report_result(&challenge.id, "alice", GameResult::Win, Some("carol"))
            .await;

        assert!(matches!(
            result,
            Err(ChallengeServiceError::Validation(ValidationError::InvalidWinner(_)))
        ));
        assert_eq!(
            fixture.stored(&challenge.id).await.status,
            ChallengeStatus::Accepted
        );
        assert_eq!(fixture.counters("alice").await, None);
    }

    #[tokio::test]
    async fn test_cancel_by_challenger_while_pending() {
        let fixture = fixture();
        let challenge = fixture.pending().await;

        let transition = fixture
            .service
            .cancel_challenge(&challenge.id, "alice")
            .await
            .unwrap();

        assert!(transition.is_applied());
        let stored = fixture.stored(&challenge.id).await;
        assert_eq!(stored.status, ChallengeStatus::Cancelled);
        assert!(stored.completed_at.is_some());
        assert!(stored.result.is_none());
        assert_eq!(fixture.counters("alice").await, None);
        assert_eq!(fixture.counters("bob").await, None);
    }

    #[tokio::test]
    async fn test_cancel_by_opponent_is_refused() {
        let fixture = fixture();
        let challenge = fixture.pending().await;

        let transition = fixture
            .service
            .cancel_challenge(&challenge.id, "bob")
            .await
            .unwrap();

        assert_eq!(transition.rejection(), Some(TransitionRejection::NotAuthorized));
    }

    #[tokio::test]
    async fn test_cancel_after_accept_is_refused() {
        let fixture = fixture();
        let challenge = fixture.accepted().await;

        let transition = fixture
            .service
            .cancel_challenge(&challenge.id, "alice")
            .await
            .unwrap();

        assert_eq!(
            transition.rejection(),
            Some(TransitionRejection::WrongState {
                current: ChallengeStatus::Accepted
            })
        );
    }

    #[tokio::test]
    async fn test_cancelled_challenge_cannot_be_accepted() {
        let fixture = fixture();
        let challenge = fixture.pending().await;
        fixture
            .service
            .cancel_challenge(&challenge.id, "alice")
            .await
            .unwrap();

        let transition = fixture
            .service
            .accept_challenge(&challenge.id, "bob")
            .await
            .unwrap();

        assert_eq!(
            transition.rejection(),
            Some(TransitionRejection::WrongState {
                current: ChallengeStatus::Cancelled
            })
        );
    }

    #[tokio::test]
    async fn test_list_challenges_splits_pending_and_active() {
        let fixture = fixture();
        let pending = fixture.pending().await;
        let active = fixture.accepted().await;
        let finished = fixture.accepted().await;
        fixture
            .service
            .report_result(&finished.id, "bob", GameResult::Win, None)
            .await
            .unwrap();

        for user in ["alice", "bob"] {
            let list = fixture.service.list_challenges(user).await.unwrap();
            let pending_ids: Vec<&str> = list.pending.iter().map(|c| c.id.as_str()).collect();
            let active_ids: Vec<&str> = list.active.iter().map(|c| c.id.as_str()).collect();
            assert_eq!(pending_ids, vec![pending.id.as_str()]);
            assert_eq!(active_ids, vec![active.id.as_str()]);
        }
        let outsider = fixture.service.list_challenges("carol").await.unwrap();
        assert!(outsider.pending.is_empty());
        assert!(outsider.active.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_after_retry_fails_closed() {
        let mut mock_repo = MockChallengeRepository::new();
        let challenge = Challenge::new("alice", "Alice", "bob", "Bob", GAME);
        let challenge_id = challenge.id.clone();
        mock_repo
            .expect_get_challenge()
            .times(2)
            .returning(move |_| Ok(Some(challenge.clone())));
        mock_repo
            .expect_update_challenge_if_status()
            .times(2)
            .returning(|_, _| Ok(false));
        let stats_service = Arc::new(StatsService::new(
            Arc::new(MockPlayerStatsRepository::new()),
            SupportedGames::default(),
        ));
        let service = ChallengeService::new(Arc::new(mock_repo), stats_service);

        let transition = service.accept_challenge(&challenge_id, "bob").await.unwrap();

        assert_eq!(transition, Transition::Rejected(TransitionRejection::Conflict));
    }

    #[tokio::test]
    async fn test_conflict_rechecks_state_from_fresh_read() {
        let mut mock_repo = MockChallengeRepository::new();
        let pending = Challenge::new("alice", "Alice", "bob", "Bob", GAME);
        let mut accepted = pending.clone();
        accepted.accept(Utc::now());
        let challenge_id = pending.id.clone();
        let reads = Arc::new(AtomicUsize::new(0));
        let read_counter = reads.clone();
        mock_repo.expect_get_challenge().returning(move |_| {
            if read_counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Some(pending.clone()))
            } else {
                Ok(Some(accepted.clone()))
            }
        });
        mock_repo
            .expect_update_challenge_if_status()
            .times(1)
            .returning(|_, _| Ok(false));
        let stats_service = Arc::new(StatsService::new(
            Arc::new(MockPlayerStatsRepository::new()),
            SupportedGames::default(),
        ));
        let service = ChallengeService::new(Arc::new(mock_repo), stats_service);

        let transition = service.accept_challenge(&challenge_id, "bob").await.unwrap();

        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(
            transition.rejection(),
            Some(TransitionRejection::WrongState {
                current: ChallengeStatus::Accepted
            })
        );
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let mut mock_repo = MockChallengeRepository::new();
        mock_repo
            .expect_get_challenge()
            .returning(|_| Err(ChallengeRepositoryError::DynamoDb("timeout".to_string())));
        mock_repo.expect_update_challenge_if_status().never();
        let stats_service = Arc::new(StatsService::new(
            Arc::new(MockPlayerStatsRepository::new()),
            SupportedGames::default(),
        ));
        let service = ChallengeService::new(Arc::new(mock_repo), stats_service);

        let result = service.cancel_challenge("any", "alice").await;

        assert!(matches!(result, Err(ChallengeServiceError::Repository(_))));
    }

    #[tokio::test]
    async fn test_failed_completion_write_leaves_report_retryable() {
        let mut accepted = Challenge::new("alice", "Alice", "bob", "Bob", GAME);
        accepted.accept(Utc::now());
        let challenge_id = accepted.id.clone();
        let mut mock_repo = MockChallengeRepository::new();
        mock_repo
            .expect_get_challenge()
            .times(2)
            .returning(move |_| Ok(Some(accepted.clone())));
        mock_repo.expect_update_challenge_if_status().never();
        let writes: Arc<Mutex<Vec<(ChallengeStatus, Vec<StatsIncrement>)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let recorded = writes.clone();
        mock_repo
            .expect_complete_challenge()
            .times(2)
            .returning(move |challenge, expected, increments| {
                assert_eq!(challenge.status, ChallengeStatus::Completed);
                let mut writes = recorded.lock().unwrap();
                writes.push((expected, increments.to_vec()));
                if writes.len() == 1 {
                    Err(ChallengeRepositoryError::DynamoDb(
                        "TransactionCanceled: throttled".to_string(),
                    ))
                } else {
                    Ok(true)
                }
            });
        let mut stats_repo = MockPlayerStatsRepository::new();
        stats_repo.expect_increment_stats().never();
        let stats_service = Arc::new(StatsService::new(
            Arc::new(stats_repo),
            SupportedGames::default(),
        ));
        let service = ChallengeService::new(Arc::new(mock_repo), stats_service);

        let first = service
            .report_result(&challenge_id, "alice", GameResult::Win, None)
            .await;
        let second = service
            .report_result(&challenge_id, "alice", GameResult::Win, None)
            .await
            .unwrap();

        assert!(matches!(first, Err(ChallengeServiceError::Repository(_))));
        assert!(second.is_applied());
        let writes = writes.lock().unwrap();
        for (expected, increments) in writes.iter() {
            assert_eq!(*expected, ChallengeStatus::Accepted);
            let deltas: Vec<(&str, StatsDelta)> = increments
                .iter()
                .map(|i| (i.player_id.as_str(), i.delta))
                .collect();
            assert_eq!(
                deltas,
                vec![("alice", StatsDelta::WIN), ("bob", StatsDelta::LOSS)]
            );
        }
    }

    #[tokio::test]
    async fn test_report_after_completion_does_not_count_twice() {
        let fixture = fixture();
        let challenge = fixture.accepted().await;
        let mut completed = fixture.stored(&challenge.id).await;
        let outcome = completed
            .resolve_outcome("alice", GameResult::Draw, None)
            .unwrap();
        completed.complete(&outcome, Utc::now());
        let increments = StatsIncrement::for_outcome(&completed, &outcome);
        fixture
            .challenges
            .complete_challenge(&completed, ChallengeStatus::Accepted, &increments)
            .await
            .unwrap();

        // A second report races in after the first completion landed
        let transition = fixture
            .service
            .report_result(&challenge.id, "bob", GameResult::Win, None)
            .await
            .unwrap();

        assert_eq!(
            transition.rejection(),
            Some(TransitionRejection::WrongState {
                current: ChallengeStatus::Completed
            })
        );
        assert_eq!(fixture.counters("alice").await, Some((0, 0, 1, 1)));
        assert_eq!(fixture.counters("bob").await, Some((0, 0, 1, 1)));
    }
}
