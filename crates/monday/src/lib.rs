//! monday.com board source.
//!
//! Reads both boards over the GraphQL API: one schema lookup for column
//! titles, then `items_page` / `next_items_page` cursor pagination. Throttled
//! (HTTP 429 or complexity errors) and 5xx responses are retried with
//! exponential backoff; exhausted retries surface as `RateLimited` or
//! `SourceUnavailable`.

mod wire;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use boardsight_core::config::SourceConfig;
use boardsight_core::domain::{BoardCategory, RawRecord};
use boardsight_core::snapshot::DataOrigin;
use boardsight_core::source::{BoardSource, SourceError};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::wire::{
    column_titles, item_to_record, BoardsData, Envelope, NextPageData, PagedBoard, SchemaBoard,
    FIRST_PAGE_QUERY, NEXT_PAGE_QUERY, SCHEMA_QUERY,
};

const BASE_RETRY_DELAY_MS: u64 = 500;
const MAX_RETRY_DELAY_MS: u64 = 8_000;
/// Hard stop for runaway cursors.
const MAX_PAGES: usize = 1_000;

#[derive(Debug, Error)]
pub enum MondaySetupError {
    #[error("monday api token is not configured")]
    MissingToken,
    #[error("board id for `{0}` is not configured")]
    MissingBoardId(BoardCategory),
    #[error("could not build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.base_delay;
        for _ in 1..attempt {
            delay = delay.saturating_mul(2);
        }
        delay.min(self.max_delay)
    }
}

/// Outcome of one HTTP exchange, before retry decisions.
#[derive(Debug, PartialEq, Eq)]
enum Attempt {
    Done(Value),
    Throttled { retry_after_secs: Option<u64> },
    Transient(String),
    Fatal(SourceError),
}

#[derive(Clone)]
pub struct MondaySource {
    client: Client,
    api_url: String,
    token: SecretString,
    boards: HashMap<BoardCategory, String>,
    page_size: u32,
    retry: RetryPolicy,
}

impl MondaySource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, MondaySetupError> {
        let token = config.api_token.clone().ok_or(MondaySetupError::MissingToken)?;
        let mut boards = HashMap::new();
        for (category, id) in [
            (BoardCategory::Deal, &config.deals_board_id),
            (BoardCategory::WorkOrder, &config.work_orders_board_id),
        ] {
            let id = id.clone().ok_or(MondaySetupError::MissingBoardId(category))?;
            boards.insert(category, id);
        }

        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            token,
            boards,
            page_size: config.page_size,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, SourceError> {
        let body = json!({ "query": query, "variables": variables });
        let mut last_throttle: Option<Option<u64>> = None;
        let mut last_failure = String::new();

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let backoff = self.retry.delay_for(attempt);
                let delay = match last_throttle {
                    Some(Some(secs)) => Duration::from_secs(secs).min(self.retry.max_delay),
                    _ => backoff,
                };
                debug!(
                    event_name = "monday.request.retry",
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying monday request"
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&body).await {
                Attempt::Done(value) => {
                    return serde_json::from_value(value)
                        .map_err(|error| SourceError::Decode(error.to_string()));
                }
                Attempt::Throttled { retry_after_secs } => {
                    warn!(event_name = "monday.request.throttled", attempt, "monday rate limit hit");
                    last_throttle = Some(retry_after_secs);
                    last_failure = "rate limited".to_string();
                }
                Attempt::Transient(reason) => {
                    warn!(event_name = "monday.request.failed", attempt, reason = %reason, "transient monday failure");
                    last_throttle = None;
                    last_failure = reason;
                }
                Attempt::Fatal(error) => return Err(error),
            }
        }

        Err(match last_throttle {
            Some(retry_after_secs) => SourceError::RateLimited { retry_after_secs },
            None => SourceError::SourceUnavailable(format!(
                "{last_failure} (after {} attempts)",
                self.retry.max_retries + 1
            )),
        })
    }

    async fn send_once(&self, body: &Value) -> Attempt {
        let response = match self
            .client
            .post(&self.api_url)
            .header("Authorization", self.token.expose_secret())
            .header("API-Version", "2024-01")
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => return Attempt::Transient(format!("request failed: {error}")),
        };

        let status = response.status();
        let retry_after_secs = retry_after(response.headers());
        let text = match response.text().await {
            Ok(text) => text,
            Err(error) => return Attempt::Transient(format!("could not read response body: {error}")),
        };
        classify(status, retry_after_secs, &text)
    }

    async fn column_titles(&self, board_id: &str) -> Result<HashMap<String, String>, SourceError> {
        let data: BoardsData<SchemaBoard> =
            self.query(SCHEMA_QUERY, json!({ "boardId": [board_id] })).await?;
        let board = data
            .boards
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::SourceUnavailable(format!("board `{board_id}` was not found")))?;
        Ok(column_titles(board))
    }
}

#[async_trait]
impl BoardSource for MondaySource {
    fn origin(&self) -> DataOrigin {
        DataOrigin::Live
    }

    async fn fetch(&self, category: BoardCategory) -> Result<Vec<RawRecord>, SourceError> {
        let board_id = self.boards.get(&category).ok_or_else(|| {
            SourceError::SourceUnavailable(format!("no board id configured for `{category}`"))
        })?;
        let titles = self.column_titles(board_id).await?;

        let first: BoardsData<PagedBoard> = self
            .query(FIRST_PAGE_QUERY, json!({ "boardId": [board_id], "limit": self.page_size }))
            .await?;
        let mut page = first
            .boards
            .into_iter()
            .next()
            .map(|board| board.items_page)
            .ok_or_else(|| SourceError::SourceUnavailable(format!("board `{board_id}` was not found")))?;

        let mut records = Vec::new();
        for pages in 1..=MAX_PAGES {
            let cursor = page.cursor.take();
            records.extend(page.items.drain(..).map(|item| item_to_record(category, item, &titles)));

            let Some(cursor) = cursor else { break };
            if pages == MAX_PAGES {
                warn!(event_name = "monday.fetch.page_cap", board = %category, "stopping at page cap");
                break;
            }
            let next: NextPageData = self
                .query(NEXT_PAGE_QUERY, json!({ "cursor": cursor, "limit": self.page_size }))
                .await?;
            page = next.next_items_page;
        }

        info!(
            event_name = "monday.fetch.completed",
            board = %category,
            board_id = %board_id,
            records = records.len(),
            "fetched monday board"
        );
        Ok(records)
    }
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}

fn classify(status: StatusCode, retry_after_secs: Option<u64>, body: &str) -> Attempt {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Attempt::Throttled { retry_after_secs };
    }
    if status.is_server_error() {
        return Attempt::Transient(format!("monday returned {status}"));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Attempt::Fatal(SourceError::SourceUnavailable(format!(
            "monday rejected the api token ({status})"
        )));
    }

    let envelope: Envelope<Value> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(error) if status.is_success() => {
            return Attempt::Fatal(SourceError::Decode(error.to_string()))
        }
        Err(_) => return Attempt::Fatal(SourceError::SourceUnavailable(format!("monday returned {status}"))),
    };
    if envelope.is_throttled() {
        return Attempt::Throttled { retry_after_secs };
    }
    if let Some(summary) = envelope.error_summary() {
        return Attempt::Fatal(SourceError::SourceUnavailable(format!("monday api error: {summary}")));
    }
    if !status.is_success() {
        return Attempt::Fatal(SourceError::SourceUnavailable(format!("monday returned {status}")));
    }
    match envelope.data {
        Some(data) => Attempt::Done(data),
        None => Attempt::Fatal(SourceError::Decode("response carried no data".to_string())),
    }
}
