//! reqwest-backed [`PinterestApi`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use super::wire::{CreatePinBody, ErrorBody, ListBoardsPage, MediaSource, Pin};
use super::{ApiError, BoardRef, CreatedPin, NewBoard, PinRequest, PinterestApi};
use crate::auth::AccessToken;
use crate::cancellation::RunContext;
use crate::config::ApiConfig;

/// Sandbox endpoint; production tokens need `https://api.pinterest.com/v5/`.
pub const DEFAULT_BASE_URL: &str = "https://api-sandbox.pinterest.com/v5/";

const MAX_ERROR_BODY_CHARS: usize = 200;

/// HTTP client for the Pinterest v5 API.
pub struct PinterestClient {
    http: reqwest::Client,
    base_url: String,
    token: AccessToken,
    page_size: u32,
}

impl std::fmt::Debug for PinterestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinterestClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl PinterestClient {
    /// Builds a client from API settings and a bearer token.
    pub fn new(config: &ApiConfig, token: AccessToken) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("pin-creator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            http,
            base_url,
            token,
            page_size: config.page_size,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.token.expose())
    }

    /// Sends `request` under `ctx` and returns the body if the status matches.
    async fn execute(
        &self,
        ctx: &RunContext,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> Result<String, ApiError> {
        let request = request.build().map_err(transport_error)?;
        debug!(
            method = %request.method(),
            url = %request.url(),
            authorization = "Bearer <redacted>",
            "Sending request"
        );

        let response = ctx
            .run(self.http.execute(request))
            .await?
            .map_err(transport_error)?;
        let status = response.status();
        let body = ctx.run(response.text()).await?.map_err(transport_error)?;

        if status != expected {
            return Err(status_error(status, &body));
        }

        debug!(status = status.as_u16(), bytes = body.len(), "Response received");
        Ok(body)
    }

    async fn fetch_board_page(
        &self,
        ctx: &RunContext,
        bookmark: Option<&str>,
    ) -> Result<ListBoardsPage, ApiError> {
        let mut request = self
            .request(Method::GET, "boards")
            .query(&[("page_size", self.page_size.to_string())]);
        if let Some(bookmark) = bookmark {
            request = request.query(&[("bookmark", bookmark)]);
        }

        let body = self.execute(ctx, request, StatusCode::OK).await?;
        decode(&body)
    }
}

#[async_trait]
impl PinterestApi for PinterestClient {
    async fn list_boards(&self, ctx: &RunContext) -> Result<Vec<BoardRef>, ApiError> {
        let mut boards = Vec::new();
        let mut seen = HashSet::new();
        let mut bookmark: Option<String> = None;

        loop {
            let page = self.fetch_board_page(ctx, bookmark.as_deref()).await?;
            boards.extend(page.items.into_iter().map(BoardRef::from));

            bookmark = next_bookmark(&mut seen, page.bookmark);
            if bookmark.is_none() {
                break;
            }
        }

        debug!(count = boards.len(), "Listed boards");
        Ok(boards)
    }

    async fn create_board(&self, ctx: &RunContext, board: &NewBoard) -> Result<(), ApiError> {
        let request = self.request(Method::POST, "boards").json(board);
        self.execute(ctx, request, StatusCode::CREATED).await?;
        Ok(())
    }

    async fn create_pin(&self, ctx: &RunContext, pin: &PinRequest) -> Result<CreatedPin, ApiError> {
        let image = tokio::fs::read(&pin.image_path).await.map_err(|e| {
            ApiError::InvalidRequest(format!("cannot read image {}: {e}", pin.image_path))
        })?;

        let body = CreatePinBody {
            link: &pin.link,
            title: &pin.title,
            description: &pin.description,
            alt_text: &pin.alt_text,
            board_id: &pin.board_id,
            media_source: MediaSource {
                source_type: "image_base64",
                content_type: content_type_for(Path::new(&pin.image_path)),
                data: STANDARD.encode(image),
            },
        };

        let request = self.request(Method::POST, "pins").json(&body);
        let response = self.execute(ctx, request, StatusCode::CREATED).await?;
        let created: Pin = decode(&response)?;
        Ok(created.into())
    }
}

/// Media content type inferred from the image extension; PNG when unknown.
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(err.to_string())
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Maps a non-matching response to [`ApiError::Status`], keeping the API's
/// code and message when the body carries them.
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| truncate(body.trim(), MAX_ERROR_BODY_CHARS));

    ApiError::Status {
        status: status.as_u16(),
        code: parsed.code,
        message,
    }
}

/// The bookmark to follow next, or `None` once paging is done. A bookmark
/// already followed ends paging so a cycling cursor cannot loop.
fn next_bookmark(seen: &mut HashSet<String>, bookmark: Option<String>) -> Option<String> {
    let next = bookmark.filter(|next| !next.is_empty())?;
    if seen.insert(next.clone()) {
        Some(next)
    } else {
        debug!(bookmark = %next, "Board listing repeated a bookmark, stopping");
        None
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
