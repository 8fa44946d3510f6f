//! In-memory Pinterest API double.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::api::{ApiError, BoardRef, CreatedPin, NewBoard, PinRequest, PinterestApi};
use crate::cancellation::RunContext;

/// One recorded API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// `list_boards`.
    ListBoards,
    /// `create_board` with its request.
    CreateBoard(NewBoard),
    /// `create_pin` with its request.
    CreatePin(PinRequest),
}

#[derive(Debug)]
struct FakeBoard {
    board: BoardRef,
    /// Listings that still omit this board.
    hidden_for: u32,
}

#[derive(Debug, Default)]
struct FakeState {
    boards: Vec<FakeBoard>,
    calls: Vec<ApiCall>,
    list_failures: VecDeque<ApiError>,
    create_board_failures: VecDeque<ApiError>,
    lost_create_board_replies: VecDeque<ApiError>,
    create_pin_failures: VecDeque<ApiError>,
    next_id: u64,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Deterministic [`PinterestApi`] with scripted boards, eventual-consistency
/// lag, injected failures and call recording.
///
/// A board created through the fake is omitted from the next
/// `visibility_lag` listings, the way the real service lags behind writes.
#[derive(Debug, Default)]
pub struct FakePinterestApi {
    state: Mutex<FakeState>,
    visibility_lag: u32,
    pin_delay: Option<Duration>,
}

impl FakePinterestApi {
    /// Creates a fake with no boards and immediate visibility.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an existing, visible board.
    #[must_use]
    pub fn with_board(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.state.lock().boards.push(FakeBoard {
            board: BoardRef::new(id, name),
            hidden_for: 0,
        });
        self
    }

    /// Hides newly created boards from the next `listings` listings.
    #[must_use]
    pub fn with_visibility_lag(mut self, listings: u32) -> Self {
        self.visibility_lag = listings;
        self
    }

    /// Makes every pin creation take `delay` before answering.
    #[must_use]
    pub fn with_pin_delay(mut self, delay: Duration) -> Self {
        self.pin_delay = Some(delay);
        self
    }

    /// Fails the next `list_boards` call with `error`.
    pub fn fail_next_list(&self, error: ApiError) {
        self.state.lock().list_failures.push_back(error);
    }

    /// Fails the next `create_board` call with `error`.
    pub fn fail_next_create_board(&self, error: ApiError) {
        self.state.lock().create_board_failures.push_back(error);
    }

    /// Applies the next `create_board` call but answers it with `error`, as
    /// when the service creates the board and the reply is lost.
    pub fn lose_next_create_board_reply(&self, error: ApiError) {
        self.state.lock().lost_create_board_replies.push_back(error);
    }

    /// Fails the next `create_pin` call with `error`.
    pub fn fail_next_create_pin(&self, error: ApiError) {
        self.state.lock().create_pin_failures.push_back(error);
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    /// Number of `list_boards` calls.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ApiCall::ListBoards))
            .count()
    }

    /// Requests passed to `create_board`, including failed ones.
    #[must_use]
    pub fn board_creations(&self) -> Vec<NewBoard> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::CreateBoard(board) => Some(board),
                _ => None,
            })
            .collect()
    }

    /// Requests passed to `create_pin`, including failed ones.
    #[must_use]
    pub fn pin_creations(&self) -> Vec<PinRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::CreatePin(pin) => Some(pin),
                _ => None,
            })
            .collect()
    }

    /// All boards the fake knows about, visible or not.
    #[must_use]
    pub fn boards(&self) -> Vec<BoardRef> {
        self.state
            .lock()
            .boards
            .iter()
            .map(|fake| fake.board.clone())
            .collect()
    }
}

#[async_trait]
impl PinterestApi for FakePinterestApi {
    async fn list_boards(&self, _ctx: &RunContext) -> Result<Vec<BoardRef>, ApiError> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::ListBoards);
        if let Some(error) = state.list_failures.pop_front() {
            return Err(error);
        }

        let mut visible = Vec::new();
        for fake in &mut state.boards {
            if fake.hidden_for == 0 {
                visible.push(fake.board.clone());
            } else {
                fake.hidden_for -= 1;
            }
        }
        Ok(visible)
    }

    async fn create_board(&self, _ctx: &RunContext, board: &NewBoard) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.calls.push(ApiCall::CreateBoard(board.clone()));
        if let Some(error) = state.create_board_failures.pop_front() {
            return Err(error);
        }

        if state.boards.iter().any(|fake| fake.board.name == board.name) {
            return Err(ApiError::Status {
                status: 409,
                code: Some(58),
                message: "You already have a board with this name.".into(),
            });
        }

        let id = state.next_id("board");
        state.boards.push(FakeBoard {
            board: BoardRef::new(id, board.name.clone()),
            hidden_for: self.visibility_lag,
        });
        match state.lost_create_board_replies.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn create_pin(&self, ctx: &RunContext, pin: &PinRequest) -> Result<CreatedPin, ApiError> {
        let failure = {
            let mut state = self.state.lock();
            state.calls.push(ApiCall::CreatePin(pin.clone()));
            state.create_pin_failures.pop_front()
        };

        if let Some(delay) = self.pin_delay {
            ctx.run(tokio::time::sleep(delay)).await?;
        }
        if let Some(error) = failure {
            return Err(error);
        }

        let id = self.state.lock().next_id("pin");
        Ok(CreatedPin {
            id,
            board_id: pin.board_id.clone(),
            title: Some(pin.title.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_board(name: &str) -> NewBoard {
        NewBoard {
            name: name.into(),
            description: "Created by pin-creator".into(),
            privacy: crate::api::Privacy::Public,
        }
    }

    #[tokio::test]
    async fn test_visibility_lag_hides_new_board() {
        let api = FakePinterestApi::new().with_visibility_lag(1);
        let ctx = RunContext::new();

        api.create_board(&ctx, &new_board("Travel")).await.expect("created");

        assert!(api.list_boards(&ctx).await.expect("list").is_empty());
        let boards = api.list_boards(&ctx).await.expect("list");
        assert_eq!(boards, vec![BoardRef::new("board-1", "Travel")]);
    }

    #[tokio::test]
    async fn test_duplicate_board_conflicts() {
        let api = FakePinterestApi::new().with_board("b-1", "Travel");
        let err = api
            .create_board(&RunContext::new(), &new_board("Travel"))
            .await
            .expect_err("conflict");
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn test_lost_reply_still_creates_board() {
        let api = FakePinterestApi::new();
        let ctx = RunContext::new();
        api.lose_next_create_board_reply(ApiError::Timeout);

        assert!(api.create_board(&ctx, &new_board("Travel")).await.is_err());
        assert_eq!(api.list_boards(&ctx).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let api = FakePinterestApi::new().with_board("b-1", "Food");
        let ctx = RunContext::new();
        api.fail_next_list(ApiError::Transport("reset".into()));

        assert!(api.list_boards(&ctx).await.is_err());
        assert_eq!(api.list_boards(&ctx).await.expect("list").len(), 1);
        assert_eq!(api.list_calls(), 2);
    }
}
