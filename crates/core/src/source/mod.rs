//! Ingestion interface consumed by the refresh path.

pub mod cache;
pub mod fixtures;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{BoardCategory, RawRecord, RawRecordSet};
use crate::snapshot::DataOrigin;

pub use cache::{CacheError, RawRecordCache};
pub use fixtures::demo_records;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("rate limited by source{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("could not decode source response: {0}")]
    Decode(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs.map(|secs| format!(" (retry after {secs}s)")).unwrap_or_default()
}

impl SourceError {
    /// Short label for logs and staleness caveats.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::Decode(_) => "decode",
        }
    }
}

/// Fetches raw records for one board.
#[async_trait]
pub trait BoardSource: Send + Sync {
    fn origin(&self) -> DataOrigin;

    async fn fetch(&self, category: BoardCategory) -> Result<Vec<RawRecord>, SourceError>;
}

/// Serves a fixed record set; backs demo mode and tests.
#[derive(Clone, Debug)]
pub struct StaticSource {
    records: RawRecordSet,
    origin: DataOrigin,
}

impl StaticSource {
    pub fn new(records: RawRecordSet, origin: DataOrigin) -> Self {
        Self { records, origin }
    }

    pub fn demo() -> Self {
        Self::new(demo_records(), DataOrigin::Demo)
    }
}

#[async_trait]
impl BoardSource for StaticSource {
    fn origin(&self) -> DataOrigin {
        self.origin
    }

    async fn fetch(&self, category: BoardCategory) -> Result<Vec<RawRecord>, SourceError> {
        Ok(self.records.records(category).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::{BoardSource, SourceError, StaticSource};
    use crate::domain::BoardCategory;

    #[tokio::test]
    async fn demo_source_serves_both_boards() {
        let source = StaticSource::demo();
        let deals = source.fetch(BoardCategory::Deal).await.expect("deals");
        let orders = source.fetch(BoardCategory::WorkOrder).await.expect("work orders");

        assert!(!deals.is_empty());
        assert!(!orders.is_empty());
        assert!(deals.iter().all(|record| record.category == BoardCategory::Deal));
    }

    #[test]
    fn rate_limit_message_includes_retry_hint() {
        let error = SourceError::RateLimited { retry_after_secs: Some(30) };
        assert_eq!(error.to_string(), "rate limited by source (retry after 30s)");
        assert_eq!(SourceError::RateLimited { retry_after_secs: None }.to_string(), "rate limited by source");
    }
}
