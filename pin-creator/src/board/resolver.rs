//! Board name to id resolution.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{ApiError, BoardRef, NewBoard, PinterestApi};
use crate::cancellation::RunContext;
use crate::config::BoardConfig;
use crate::errors::PinCreatorError;
use crate::retry::{Clock, Failure, RetryError, RetryPolicy};

/// Where a resolution currently is. Logged as the `state` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    /// Fetching the board list.
    Listing,
    /// The board is listed.
    Found,
    /// The board is not listed and has not been created yet.
    NotFound,
    /// Creating the board.
    Creating,
    /// Created but not listed yet; waiting before listing again.
    Waiting,
    /// The API rejected the board.
    FailedPermanent,
    /// The resolution deadline passed or the run was cancelled.
    FailedTimeout,
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Listing => "listing",
            Self::Found => "found",
            Self::NotFound => "not_found",
            Self::Creating => "creating",
            Self::Waiting => "waiting",
            Self::FailedPermanent => "failed_permanent",
            Self::FailedTimeout => "failed_timeout",
        };
        f.write_str(name)
    }
}

/// Why one resolution attempt did not produce a board.
#[derive(Debug, Clone)]
enum ResolveFailure {
    Api(ApiError),
    NotVisible,
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "{e}"),
            Self::NotVisible => write!(f, "board not listed after creation"),
        }
    }
}

/// Create failures worth retrying: network trouble, throttling, server errors
/// and the 404s the API returns while a new account settles. Only throttling
/// and 404s lead to another create; the rest may have created the board.
fn classify_create(error: ApiError) -> Failure<ResolveFailure> {
    if error.is_transient() || error.is_not_found() || error.is_timeout() {
        Failure::Retryable(ResolveFailure::Api(error))
    } else {
        Failure::Permanent(ResolveFailure::Api(error))
    }
}

/// Maps board names to ids, creating missing boards.
///
/// A single resolution creates the board at most once; afterwards it keeps
/// listing, with backoff, until the new board shows up or the resolution
/// deadline passes.
pub struct BoardResolver {
    api: Arc<dyn PinterestApi>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    timeout: Duration,
    defaults: BoardConfig,
}

impl fmt::Debug for BoardResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardResolver")
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl BoardResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        api: Arc<dyn PinterestApi>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        timeout: Duration,
        defaults: BoardConfig,
    ) -> Self {
        Self {
            api,
            clock,
            policy,
            timeout,
            defaults,
        }
    }

    /// Returns the board named `name`, creating it if needed.
    pub async fn resolve(&self, ctx: &RunContext, name: &str) -> Result<BoardRef, PinCreatorError> {
        let resolve_ctx = ctx.with_timeout(self.clock.now(), self.timeout);
        let created = AtomicBool::new(false);

        let outcome = {
            let ctx = &resolve_ctx;
            let created = &created;
            self.policy
                .run_until_success(ctx, self.clock.as_ref(), move || {
                    self.attempt(ctx, name, created)
                })
                .await
        };

        match outcome {
            Ok(board) => {
                info!(state = %ResolveState::Found, board = name, board_id = %board.id, "Board resolved");
                Ok(board)
            }
            Err(RetryError::Permanent(failure)) => {
                warn!(state = %ResolveState::FailedPermanent, board = name, error = %failure, "Board rejected");
                Err(match failure {
                    ResolveFailure::Api(e) => PinCreatorError::PermanentApi(e),
                    ResolveFailure::NotVisible => PinCreatorError::TransientApi {
                        attempts: 1,
                        last: failure.to_string(),
                    },
                })
            }
            Err(err @ RetryError::Timeout { .. }) => {
                warn!(state = %ResolveState::FailedTimeout, board = name, error = %err, "Board resolution timed out");
                Err(PinCreatorError::Timeout(format!("board `{name}`: {err}")))
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(board = name, attempts, error = %last, "Board resolution retries exhausted");
                Err(PinCreatorError::TransientApi {
                    attempts,
                    last: last.to_string(),
                })
            }
        }
    }

    async fn attempt(
        &self,
        ctx: &RunContext,
        name: &str,
        created: &AtomicBool,
    ) -> Result<BoardRef, Failure<ResolveFailure>> {
        if let Some(board) = self.find(ctx, name).await? {
            return Ok(board);
        }

        if created.load(Ordering::SeqCst) {
            debug!(state = %ResolveState::Waiting, board = name, "Board not listed yet");
            return Err(Failure::Retryable(ResolveFailure::NotVisible));
        }

        info!(state = %ResolveState::NotFound, board = name, "Board not found");
        info!(state = %ResolveState::Creating, board = name, "Creating board");
        let board = NewBoard {
            name: name.to_string(),
            description: self.defaults.description.clone(),
            privacy: self.defaults.privacy,
        };
        if let Err(error) = self.api.create_board(ctx, &board).await {
            if error.is_outcome_unknown() {
                warn!(board = name, error = %error, "Board creation outcome unknown, waiting for it to be listed");
                created.store(true, Ordering::SeqCst);
            }
            return Err(classify_create(error));
        }
        created.store(true, Ordering::SeqCst);

        if let Some(board) = self.find(ctx, name).await? {
            return Ok(board);
        }
        debug!(state = %ResolveState::Waiting, board = name, "Created board not listed yet");
        Err(Failure::Retryable(ResolveFailure::NotVisible))
    }

    async fn find(
        &self,
        ctx: &RunContext,
        name: &str,
    ) -> Result<Option<BoardRef>, Failure<ResolveFailure>> {
        debug!(state = %ResolveState::Listing, board = name, "Listing boards");
        let boards = self
            .api
            .list_boards(ctx)
            .await
            .map_err(|e| Failure::Retryable(ResolveFailure::Api(e)))?;
        Ok(boards.into_iter().find(|board| board.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::{FakePinterestApi, ManualClock};
    use pretty_assertions::assert_eq;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_secs).collect()
    }

    fn resolver(api: &Arc<FakePinterestApi>, clock: &Arc<ManualClock>, policy: RetryPolicy) -> BoardResolver {
        BoardResolver::new(
            api.clone(),
            clock.clone(),
            policy,
            TIMEOUT,
            BoardConfig::default(),
        )
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new().with_base_delay(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_existing_board_needs_no_create() {
        let api = Arc::new(FakePinterestApi::new().with_board("b-9", "Travel"));
        let clock = Arc::new(ManualClock::new());

        let board = resolver(&api, &clock, policy())
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect("resolved");

        assert_eq!(board, BoardRef::new("b-9", "Travel"));
        assert!(api.board_creations().is_empty());
        assert_eq!(api.list_calls(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_created_board_visible_immediately() {
        let api = Arc::new(FakePinterestApi::new());
        let clock = Arc::new(ManualClock::new());

        let board = resolver(&api, &clock, policy())
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect("resolved");

        assert_eq!(board.name, "Travel");
        let creations = api.board_creations();
        assert_eq!(creations.len(), 1);
        assert_eq!(creations[0].description, "Created by pin-creator");
        assert_eq!(api.list_calls(), 2);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_waits_for_eventual_consistency_without_recreating() {
        let api = Arc::new(FakePinterestApi::new().with_visibility_lag(2));
        let clock = Arc::new(ManualClock::new());

        let board = resolver(&api, &clock, policy())
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect("resolved");

        assert_eq!(board.id, "board-1");
        assert_eq!(api.board_creations().len(), 1);
        assert_eq!(api.list_calls(), 4);
        assert_eq!(clock.sleeps(), secs(&[1, 2]));
    }

    #[tokio::test]
    async fn test_name_conflict_is_permanent() {
        let api = Arc::new(FakePinterestApi::new());
        api.fail_next_create_board(ApiError::Status {
            status: 409,
            code: Some(58),
            message: "You already have a board with this name.".into(),
        });
        let clock = Arc::new(ManualClock::new());

        let err = resolver(&api, &clock, policy())
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect_err("conflict");

        assert_eq!(err.kind(), ErrorKind::PermanentApi);
        assert_eq!(api.board_creations().len(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_create_is_retried() {
        let api = Arc::new(FakePinterestApi::new());
        api.fail_next_create_board(ApiError::Status {
            status: 429,
            code: Some(8),
            message: "Too many requests".into(),
        });
        api.fail_next_create_board(ApiError::Status {
            status: 404,
            code: None,
            message: "not found".into(),
        });
        let clock = Arc::new(ManualClock::new());

        let board = resolver(&api, &clock, policy())
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect("resolved");

        assert_eq!(board.name, "Travel");
        assert_eq!(api.board_creations().len(), 3);
        assert_eq!(api.boards().len(), 1);
        assert_eq!(clock.sleeps(), secs(&[1, 2]));
    }

    #[tokio::test]
    async fn test_lost_create_reply_is_not_recreated() {
        let api = Arc::new(FakePinterestApi::new().with_visibility_lag(1));
        api.lose_next_create_board_reply(ApiError::Status {
            status: 503,
            code: None,
            message: "unavailable".into(),
        });
        let clock = Arc::new(ManualClock::new());

        let board = resolver(&api, &clock, policy())
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect("resolved");

        assert_eq!(board.id, "board-1");
        assert_eq!(api.board_creations().len(), 1);
        assert_eq!(api.list_calls(), 3);
        assert_eq!(clock.sleeps(), secs(&[1, 2]));
    }

    #[tokio::test]
    async fn test_server_error_on_create_waits_instead_of_recreating() {
        let api = Arc::new(FakePinterestApi::new());
        api.fail_next_create_board(ApiError::Transport("connection reset".into()));
        let clock = Arc::new(ManualClock::new());

        let err = resolver(&api, &clock, policy())
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect_err("never listed");

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(api.board_creations().len(), 1);
        assert_eq!(clock.sleeps(), secs(&[1, 2, 4, 8]));
    }

    #[tokio::test]
    async fn test_list_failures_are_retried() {
        let api = Arc::new(FakePinterestApi::new().with_board("b-1", "Travel"));
        api.fail_next_list(ApiError::Transport("connection reset".into()));
        api.fail_next_list(ApiError::Status {
            status: 401,
            code: Some(2),
            message: "Authentication failed.".into(),
        });
        let clock = Arc::new(ManualClock::new());

        let board = resolver(&api, &clock, policy())
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect("resolved");

        assert_eq!(board.id, "b-1");
        assert_eq!(clock.sleeps(), secs(&[1, 2]));
    }

    #[tokio::test]
    async fn test_times_out_when_board_never_appears() {
        let api = Arc::new(FakePinterestApi::new().with_visibility_lag(u32::MAX));
        let clock = Arc::new(ManualClock::new());

        let err = resolver(&api, &clock, policy())
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect_err("never visible");

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(api.board_creations().len(), 1);
        // 1 + 2 + 4 + 8 = 15s elapsed; waiting 16s more would pass 30s.
        assert_eq!(clock.sleeps(), secs(&[1, 2, 4, 8]));
    }

    #[tokio::test]
    async fn test_exhausted_attempts_are_transient() {
        let api = Arc::new(FakePinterestApi::new().with_visibility_lag(u32::MAX));
        let clock = Arc::new(ManualClock::new());

        let err = resolver(&api, &clock, policy().with_max_attempts(3))
            .resolve(&RunContext::new(), "Travel")
            .await
            .expect_err("exhausted");

        assert_eq!(err.kind(), ErrorKind::TransientApi);
        assert!(matches!(err, PinCreatorError::TransientApi { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_run_is_timeout() {
        let api = Arc::new(FakePinterestApi::new().with_board("b-1", "Travel"));
        let clock = Arc::new(ManualClock::new());
        let ctx = RunContext::new();
        ctx.cancel("ctrl-c");

        let err = resolver(&api, &clock, policy())
            .resolve(&ctx, "Travel")
            .await
            .expect_err("cancelled");

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_parent_deadline_narrows_resolution() {
        let api = Arc::new(FakePinterestApi::new().with_visibility_lag(u32::MAX));
        let clock = Arc::new(ManualClock::new());
        let ctx = RunContext::new().with_timeout(clock.now(), Duration::from_secs(5));

        let err = resolver(&api, &clock, policy())
            .resolve(&ctx, "Travel")
            .await
            .expect_err("parent deadline");

        assert!(err.is_timeout());
        assert_eq!(clock.sleeps(), secs(&[1, 2]));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ResolveState::NotFound.to_string(), "not_found");
        assert_eq!(ResolveState::FailedTimeout.to_string(), "failed_timeout");
    }
}
