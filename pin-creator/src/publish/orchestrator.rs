//! One publish run: next entry, board, pin, completion flag.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Instrument};
use uuid::Uuid;

use super::PublishOutcome;
use crate::api::{ApiError, CreatedPin, PinRequest, PinterestApi};
use crate::board::BoardResolver;
use crate::cancellation::RunContext;
use crate::config::RunConfig;
use crate::errors::{PinCreatorError, Stage};
use crate::observability::SpanTimer;
use crate::retry::Clock;
use crate::schedule::ScheduleStore;

/// Publishes the next pending schedule entry.
pub struct PublishOrchestrator {
    store: Arc<dyn ScheduleStore>,
    api: Arc<dyn PinterestApi>,
    resolver: BoardResolver,
    clock: Arc<dyn Clock>,
    pin_timeout: Duration,
}

impl std::fmt::Debug for PublishOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishOrchestrator")
            .field("resolver", &self.resolver)
            .field("pin_timeout", &self.pin_timeout)
            .finish_non_exhaustive()
    }
}

impl PublishOrchestrator {
    /// Creates an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        api: Arc<dyn PinterestApi>,
        resolver: BoardResolver,
        clock: Arc<dyn Clock>,
        pin_timeout: Duration,
    ) -> Self {
        Self {
            store,
            api,
            resolver,
            clock,
            pin_timeout,
        }
    }

    /// Creates an orchestrator with timeouts, retry and board settings taken
    /// from `config`.
    #[must_use]
    pub fn from_config(
        config: &RunConfig,
        store: Arc<dyn ScheduleStore>,
        api: Arc<dyn PinterestApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolver = BoardResolver::new(
            api.clone(),
            clock.clone(),
            config.retry.clone(),
            config.timeouts.board_resolution(),
            config.board.clone(),
        );
        Self::new(store, api, resolver, clock, config.timeouts.pin_creation())
    }

    /// Publishes at most one entry. Every log line of the run carries a fresh
    /// `run_id`.
    pub async fn run(&self, ctx: &RunContext) -> Result<PublishOutcome, PinCreatorError> {
        let run_id = Uuid::now_v7();
        let span = tracing::info_span!("publish_run", %run_id);
        self.publish(ctx).instrument(span).await
    }

    async fn publish(&self, ctx: &RunContext) -> Result<PublishOutcome, PinCreatorError> {
        let next = self
            .store
            .next()
            .map_err(|e| PinCreatorError::from(e).in_stage(Stage::ReadingSchedule))?;
        let Some(entry) = next else {
            info!("No pin scheduled for creation");
            return Ok(PublishOutcome::NothingToDo);
        };

        info!(
            index = entry.index,
            board = %entry.board_name,
            title = %entry.title,
            "Publishing scheduled pin"
        );
        let timer = SpanTimer::start("publish");

        let board = self
            .resolver
            .resolve(ctx, &entry.board_name)
            .await
            .map_err(|e| e.in_stage(Stage::ResolvingBoard))?;

        let request = PinRequest::from_entry(&entry, board.id.clone());
        let pin = self
            .create_pin(ctx, &request)
            .await
            .map_err(|e| e.in_stage(Stage::CreatingPin))?;
        info!(
            pin_id = %pin.id,
            board_id = %board.id,
            "Created pin '{}' in board '{}'",
            entry.title,
            board.name
        );
        let elapsed = timer.finish();

        if let Err(source) = self.store.mark_created(entry.index) {
            return Err(PinCreatorError::Unrecorded {
                pin_id: pin.id,
                index: entry.index,
                source,
            }
            .in_stage(Stage::MarkingComplete));
        }

        Ok(PublishOutcome::Published {
            entry,
            board,
            pin,
            elapsed,
        })
    }

    /// Submits the pin once, under its own deadline.
    async fn create_pin(
        &self,
        ctx: &RunContext,
        request: &PinRequest,
    ) -> Result<CreatedPin, PinCreatorError> {
        let pin_ctx = ctx.with_timeout(self.clock.now(), self.pin_timeout);

        match pin_ctx.run(self.api.create_pin(&pin_ctx, request)).await {
            Ok(Ok(pin)) => Ok(pin),
            Err(interrupted) => Err(PinCreatorError::Timeout(format!(
                "pin creation: {interrupted}"
            ))),
            Ok(Err(e)) if e.is_timeout() => Err(PinCreatorError::Timeout(format!(
                "pin creation: {e}"
            ))),
            Ok(Err(ApiError::InvalidRequest(message))) => Err(PinCreatorError::Validation(message)),
            Ok(Err(e)) if e.is_transient() => Err(PinCreatorError::TransientApi {
                attempts: 1,
                last: e.to_string(),
            }),
            Ok(Err(e)) => Err(PinCreatorError::PermanentApi(e)),
        }
    }
}
