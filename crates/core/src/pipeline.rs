//! Normalize, audit, measure and compose, wired from one set of rule tables.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::domain::{BoardCategory, RawRecord};
use crate::insight::{BoardInput, InsightComposer, Question, QuestionRouter, Response};
use crate::metrics::{MetricEngine, MetricSet};
use crate::normalize::Normalizer;
use crate::quality::QualityAuditor;
use crate::rules::RuleTables;
use crate::snapshot::{BoardSnapshot, DataOrigin, Freshness, Snapshot};

#[derive(Clone, Debug)]
pub struct AnalysisPipeline {
    normalizer: Normalizer,
    auditor: QualityAuditor,
    engine: MetricEngine,
    router: QuestionRouter,
    composer: InsightComposer,
}

impl AnalysisPipeline {
    pub fn new(rules: &RuleTables, analysis: &AnalysisConfig) -> Self {
        Self {
            normalizer: Normalizer::new(rules),
            auditor: QualityAuditor::new(analysis.missing_data_threshold),
            engine: MetricEngine::new(rules.stage_order.clone(), analysis.at_risk_top_n),
            router: QuestionRouter::new(&rules.lexicon),
            composer: InsightComposer::new(rules, analysis.details_limit),
        }
    }

    /// Normalized and audited board, marked fresh.
    pub fn build_board(
        &self,
        category: BoardCategory,
        raw: &[RawRecord],
        origin: DataOrigin,
        refreshed_at: DateTime<Utc>,
        today: NaiveDate,
    ) -> BoardSnapshot {
        let records = self.normalizer.normalize_table(raw);
        let quality = self.auditor.audit(category, &records, today);
        debug!(
            event_name = "pipeline.board.built",
            board = %category,
            records = records.len(),
            issues = quality.issues.len(),
            "board normalized and audited"
        );
        BoardSnapshot {
            category,
            records,
            quality,
            refreshed_at: Some(refreshed_at),
            freshness: Freshness::Fresh,
            origin,
        }
    }

    pub fn metrics(&self, board: &BoardSnapshot, today: NaiveDate) -> MetricSet {
        self.engine.compute(board.category, &board.records, today)
    }

    pub fn classify(&self, text: &str) -> Question {
        self.router.classify(text)
    }

    /// Answers from one snapshot only; boards the question needs but the
    /// snapshot lacks are treated as unavailable.
    pub fn answer(&self, question: &Question, snapshot: &Snapshot, today: NaiveDate) -> Response {
        let missing: Vec<BoardSnapshot> = question
            .required_boards
            .iter()
            .filter(|category| snapshot.board(**category).is_none())
            .map(|category| BoardSnapshot::unavailable(*category, "board was never loaded"))
            .collect();

        let boards: Vec<&BoardSnapshot> = question
            .required_boards
            .iter()
            .filter_map(|category| {
                snapshot
                    .board(*category)
                    .or_else(|| missing.iter().find(|board| board.category == *category))
            })
            .collect();
        let metrics: Vec<MetricSet> = boards.iter().map(|board| self.metrics(board, today)).collect();
        let inputs: Vec<BoardInput<'_>> = boards
            .iter()
            .zip(&metrics)
            .map(|(board, metrics)| BoardInput { board: *board, metrics })
            .collect();

        self.composer.compose(question, &inputs)
    }

    pub fn ask(&self, text: &str, snapshot: &Snapshot, today: NaiveDate) -> Response {
        let question = self.classify(text);
        self.answer(&question, snapshot, today)
    }
}
