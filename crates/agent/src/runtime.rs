use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use boardsight_core::clock::{Clock, SystemClock};
use boardsight_core::domain::{BoardCategory, RawRecord, RawRecordSet};
use boardsight_core::insight::{Intent, Response, SummarySource};
use boardsight_core::pipeline::AnalysisPipeline;
use boardsight_core::quality::QualityReport;
use boardsight_core::snapshot::{BoardSnapshot, DataOrigin, Freshness, Snapshot};
use boardsight_core::source::{BoardSource, RawRecordCache, SourceError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::narrative::{NarrativeError, NarrativeGenerator, NoopNarrator};
use crate::sources::{load_cache, store_cache};
use crate::store::SnapshotStore;

pub const DEFAULT_NARRATIVE_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RefreshSummary {
    pub generation: u64,
    pub records_fetched: BTreeMap<BoardCategory, usize>,
    pub quality_reports: BTreeMap<BoardCategory, QualityReport>,
    /// Boards that could not be fetched, with the reason.
    pub stale: BTreeMap<BoardCategory, String>,
    /// blake3 over the serialized quality reports and metric sets.
    pub fingerprint: String,
}

impl RefreshSummary {
    pub fn is_complete(&self) -> bool {
        self.stale.is_empty()
    }
}

/// Owns the current snapshot and answers questions against it.
pub struct BoardAgent {
    source: Arc<dyn BoardSource>,
    cache: Option<RawRecordCache>,
    pipeline: AnalysisPipeline,
    narrator: Arc<dyn NarrativeGenerator>,
    narrative_timeout: Duration,
    fetch_timeout: Duration,
    clock: Arc<dyn Clock>,
    store: SnapshotStore,
    refresh_gate: Mutex<()>,
}

impl BoardAgent {
    pub fn new(source: Arc<dyn BoardSource>, pipeline: AnalysisPipeline) -> Self {
        Self {
            source,
            cache: None,
            pipeline,
            narrator: Arc::new(NoopNarrator),
            narrative_timeout: DEFAULT_NARRATIVE_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            clock: Arc::new(SystemClock),
            store: SnapshotStore::new(),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Raw cache written after live fetches and read when a fetch fails.
    pub fn with_cache(mut self, cache: RawRecordCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn NarrativeGenerator>, timeout: Duration) -> Self {
        self.narrator = narrator;
        self.narrative_timeout = timeout;
        self
    }

    /// Bound on one board fetch; expiry is treated as the source being unavailable.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current().await
    }

    /// Re-fetches every board and swaps in a new snapshot. Failed boards keep
    /// their previous data marked stale, then fall back to the raw cache,
    /// then to an empty unavailable board. Never fails as a whole.
    pub async fn refresh(&self) -> RefreshSummary {
        let _gate = self.refresh_gate.lock().await;
        let previous = self.store.current().await;
        let now = self.clock.now();
        let today = self.clock.today();
        let origin = self.source.origin();

        let mut fetched = RawRecordSet::default();
        let mut boards = BTreeMap::new();
        let mut records_fetched = BTreeMap::new();
        let mut stale = BTreeMap::new();
        let mut cached: Option<Option<RawRecordSet>> = None;

        for category in BoardCategory::ALL {
            match self.fetch(category).await {
                Ok(records) => {
                    info!(
                        event_name = "refresh.board.fetched",
                        board = %category,
                        origin = ?origin,
                        records = records.len(),
                        "board fetched"
                    );
                    records_fetched.insert(category, records.len());
                    boards.insert(
                        category,
                        self.pipeline.build_board(category, &records, origin, now, today),
                    );
                    fetched.insert(category, records);
                }
                Err(error) => {
                    let reason = error.to_string();
                    warn!(
                        event_name = "refresh.board.failed",
                        board = %category,
                        error_kind = error.kind(),
                        reason = %reason,
                        "board fetch failed; serving fallback"
                    );
                    records_fetched.insert(category, 0);
                    let board = self
                        .fallback_board(category, &previous, &mut cached, &reason, now, today)
                        .await;
                    stale.insert(category, reason);
                    boards.insert(category, board);
                }
            }
        }

        if origin == DataOrigin::Live && stale.is_empty() {
            if let Some(cache) = &self.cache {
                match store_cache(cache, fetched).await {
                    Ok(()) => debug!(
                        event_name = "refresh.cache.written",
                        path = %cache.path().display(),
                        "raw cache updated"
                    ),
                    Err(error) => warn!(
                        event_name = "refresh.cache.write_failed",
                        error = %error,
                        "could not update raw cache"
                    ),
                }
            }
        }

        let fingerprint = self.fingerprint(&boards, today);
        let quality_reports =
            boards.iter().map(|(category, board)| (*category, board.quality.clone())).collect();
        let snapshot = self.store.publish(boards).await;

        info!(
            event_name = "refresh.completed",
            generation = snapshot.generation,
            stale_boards = stale.len(),
            fingerprint = %fingerprint,
            "snapshot swapped"
        );
        RefreshSummary {
            generation: snapshot.generation,
            records_fetched,
            quality_reports,
            stale,
            fingerprint,
        }
    }

    async fn fetch(&self, category: BoardCategory) -> Result<Vec<RawRecord>, SourceError> {
        match tokio::time::timeout(self.fetch_timeout, self.source.fetch(category)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::SourceUnavailable(format!(
                "fetch timed out after {}s",
                self.fetch_timeout.as_secs()
            ))),
        }
    }

    async fn fallback_board(
        &self,
        category: BoardCategory,
        previous: &Snapshot,
        cached: &mut Option<Option<RawRecordSet>>,
        reason: &str,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> BoardSnapshot {
        if let Some(board) = previous
            .board(category)
            .filter(|board| !matches!(board.freshness, Freshness::Unavailable { .. }))
        {
            return board.clone().into_stale(reason);
        }

        if cached.is_none() {
            *cached = Some(self.read_cache().await);
        }
        match cached.as_ref().and_then(Option::as_ref) {
            Some(set) if set.0.contains_key(&category) => self
                .pipeline
                .build_board(category, set.records(category), DataOrigin::Cache, now, today)
                .into_stale(format!("{reason}; served from raw cache")),
            _ => BoardSnapshot::unavailable(category, reason),
        }
    }

    async fn read_cache(&self) -> Option<RawRecordSet> {
        let cache = self.cache.as_ref().filter(|cache| cache.exists())?;
        match load_cache(cache).await {
            Ok(set) => Some(set),
            Err(error) => {
                warn!(event_name = "refresh.cache.read_failed", error = %error, "raw cache unreadable");
                None
            }
        }
    }

    fn fingerprint(&self, boards: &BTreeMap<BoardCategory, BoardSnapshot>, today: NaiveDate) -> String {
        let mut hasher = blake3::Hasher::new();
        for (category, board) in boards {
            let metrics = self.pipeline.metrics(board, today);
            hasher.update(category.as_str().as_bytes());
            hash_json(&mut hasher, *category, "quality", &board.quality);
            hash_json(&mut hasher, *category, "metrics", &metrics);
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Answers from whichever snapshot is current when the call starts.
    /// Never fails: missing data and collaborator failures become caveats or
    /// a templated summary.
    pub async fn ask(&self, question: &str) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let snapshot = self.store.current().await;
        let today = self.clock.today();

        let question = self.pipeline.classify(question);
        info!(
            event_name = "ask.classified",
            correlation_id = %correlation_id,
            intent = question.intent.as_str(),
            generation = snapshot.generation,
            "question classified"
        );

        let mut response = self.pipeline.answer(&question, &snapshot, today);
        if response.intent != Intent::Unknown {
            self.narrate(&mut response, &correlation_id).await;
        }

        info!(
            event_name = "ask.answered",
            correlation_id = %correlation_id,
            caveats = response.caveats.len(),
            summary_source = ?response.summary_source,
            "question answered"
        );
        response
    }

    async fn narrate(&self, response: &mut Response, correlation_id: &str) {
        let outcome =
            match tokio::time::timeout(self.narrative_timeout, self.narrator.generate_summary(&*response)).await {
                Ok(result) => result,
                Err(_) => Err(NarrativeError::Timeout),
            };

        match outcome {
            Ok(summary) => {
                response.executive_summary = summary;
                response.summary_source = SummarySource::Narrative;
            }
            Err(error) => info!(
                event_name = "ask.narrative.fallback",
                correlation_id = %correlation_id,
                reason = %error,
                "using templated summary"
            ),
        }
    }
}

fn hash_json<T: Serialize>(hasher: &mut blake3::Hasher, category: BoardCategory, part: &'static str, value: &T) {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            hasher.update(&bytes);
        }
        Err(error) => warn!(
            event_name = "refresh.fingerprint.serialize_failed",
            board = %category,
            part,
            error = %error,
            "fingerprint input could not be serialized; hashing without it"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use boardsight_core::domain::BoardCategory;

    use super::hash_json;

    #[test]
    fn unserializable_fingerprint_input_is_skipped_without_panicking() {
        // Non-string map keys cannot be encoded as JSON.
        let unserializable: BTreeMap<(u8, u8), u8> = BTreeMap::from([((1, 2), 3)]);

        let mut hasher = blake3::Hasher::new();
        hash_json(&mut hasher, BoardCategory::Deal, "metrics", &unserializable);
        assert_eq!(hasher.finalize(), blake3::Hasher::new().finalize());

        let mut hasher = blake3::Hasher::new();
        hash_json(&mut hasher, BoardCategory::Deal, "metrics", &vec![1, 2, 3]);
        assert_eq!(hasher.finalize(), blake3::hash(b"[1,2,3]"));
    }
}
