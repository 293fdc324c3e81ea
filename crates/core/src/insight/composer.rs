use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BoardCategory, NormalizedRecord};
use crate::insight::router::{Intent, Question};
use crate::metrics::{format_money, MetricSet, MetricValue};
use crate::quality::Severity;
use crate::rules::{MetricRule, RuleTables};
use crate::snapshot::{BoardSnapshot, DataOrigin, Freshness};

pub const DEFAULT_DETAILS_LIMIT: usize = 20;

const EXAMPLE_QUESTIONS: &[&str] = &[
    "What is our win rate?",
    "Which work orders are at risk?",
    "How is the business doing overall?",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Template,
    Narrative,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataUsed {
    pub category: BoardCategory,
    pub records: usize,
    pub freshness: Freshness,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub origin: DataOrigin,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub category: BoardCategory,
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub owner: Option<String>,
    pub amount: Option<String>,
    pub stage: Option<String>,
    pub target_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub question: String,
    pub intent: Intent,
    pub executive_summary: String,
    pub summary_source: SummarySource,
    pub data_used: Vec<DataUsed>,
    pub metrics: BTreeMap<BoardCategory, BTreeMap<String, MetricValue>>,
    pub insights: Vec<String>,
    pub caveats: Vec<String>,
    pub recommendations: Vec<String>,
    pub details: Vec<DetailRow>,
}

impl Response {
    pub fn metric(&self, category: BoardCategory, name: &str) -> Option<&MetricValue> {
        self.metrics.get(&category).and_then(|metrics| metrics.get(name))
    }
}

/// One board's contribution to an answer.
#[derive(Clone, Copy, Debug)]
pub struct BoardInput<'a> {
    pub board: &'a BoardSnapshot,
    pub metrics: &'a MetricSet,
}

#[derive(Clone, Debug)]
pub struct InsightComposer {
    insight_rules: Vec<MetricRule>,
    recommendation_rules: Vec<MetricRule>,
    default_recommendation: String,
    critical_missing_rate: f64,
    details_limit: usize,
}

impl InsightComposer {
    pub fn new(rules: &RuleTables, details_limit: usize) -> Self {
        Self {
            insight_rules: rules.insight_rules.clone(),
            recommendation_rules: rules.recommendation_rules.clone(),
            default_recommendation: rules.default_recommendation.clone(),
            critical_missing_rate: rules.critical_missing_rate,
            details_limit,
        }
    }

    pub fn compose(&self, question: &Question, inputs: &[BoardInput<'_>]) -> Response {
        if question.intent == Intent::Unknown {
            return self.guidance(question);
        }

        let mut response = Response {
            question: question.text.clone(),
            intent: question.intent,
            executive_summary: String::new(),
            summary_source: SummarySource::Template,
            data_used: Vec::new(),
            metrics: BTreeMap::new(),
            insights: Vec::new(),
            caveats: Vec::new(),
            recommendations: Vec::new(),
            details: Vec::new(),
        };

        for input in inputs {
            let category = input.board.category;
            response.data_used.push(DataUsed {
                category,
                records: input.board.records.len(),
                freshness: input.board.freshness.clone(),
                refreshed_at: input.board.refreshed_at,
                origin: input.board.origin,
            });
            response.metrics.insert(category, input.metrics.metrics.clone());

            response.caveats.extend(freshness_caveat(input.board));
            response.caveats.extend(
                input
                    .board
                    .quality
                    .issues_at_least(Severity::Warning)
                    .map(|issue| format!("{}: {}", category.label(), issue.message)),
            );
            if !input.board.records.is_empty() {
                response.caveats.extend(input.metrics.metrics.iter().filter_map(|(name, value)| {
                    match value {
                        MetricValue::InsufficientData { reason } => Some(format!(
                            "{} {name} could not be computed: insufficient data ({reason})",
                            category.label()
                        )),
                        _ => None,
                    }
                }));
            }

            response.insights.extend(apply_rules(&self.insight_rules, input.metrics));
            response.recommendations.extend(apply_rules(&self.recommendation_rules, input.metrics));
            if let Some((column, rate)) = input.board.quality.worst_missing_column() {
                if rate > self.critical_missing_rate {
                    response.recommendations.push(format!(
                        "Improve data capture for {} on the {} board ({:.0}% missing)",
                        column.as_str(),
                        category,
                        rate * 100.0
                    ));
                }
            }

            if question.wants_details {
                response.details.extend(
                    input.board.records.iter().take(self.details_limit).map(detail_row),
                );
            }
        }

        if response.recommendations.is_empty() {
            response.recommendations.push(self.default_recommendation.clone());
        }
        response.executive_summary = template_summary(question.intent, inputs, &response.caveats);
        response
    }

    fn guidance(&self, question: &Question) -> Response {
        Response {
            question: question.text.clone(),
            intent: Intent::Unknown,
            executive_summary: format!(
                "I could not tell whether this is about the sales pipeline, work-order execution or overall business health. Please rephrase, for example: {}",
                EXAMPLE_QUESTIONS.join(" / ")
            ),
            summary_source: SummarySource::Template,
            data_used: Vec::new(),
            metrics: BTreeMap::new(),
            insights: Vec::new(),
            caveats: Vec::new(),
            recommendations: Vec::new(),
            details: Vec::new(),
        }
    }
}

fn apply_rules(rules: &[MetricRule], metrics: &MetricSet) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.category == metrics.category)
        .filter_map(|rule| {
            let value = metrics.get(&rule.metric)?;
            let scalar = value.as_f64()?;
            rule.comparison
                .holds(scalar, rule.threshold)
                .then(|| rule.message.replace("{value}", &value.display()))
        })
        .collect()
}

fn freshness_caveat(board: &BoardSnapshot) -> Option<String> {
    match &board.freshness {
        Freshness::Fresh => None,
        Freshness::Stale { reason } => Some(format!(
            "{} data may be out of date ({reason}); showing the last successful refresh",
            board.category.label()
        )),
        Freshness::Unavailable { reason } => {
            Some(format!("{} data is unavailable ({reason})", board.category.label()))
        }
    }
}

fn detail_row(record: &NormalizedRecord) -> DetailRow {
    DetailRow {
        category: record.category,
        id: record.id.clone(),
        name: record.name.get().cloned(),
        status: record.status().map(|status| status.as_str().to_string()),
        owner: record.owner.get().cloned(),
        amount: record.amount.get().map(|amount| format_money(*amount)),
        stage: record.stage.get().cloned(),
        target_date: record.target_date.value.or(record.close_date.value),
    }
}

fn metric_text(metrics: &MetricSet, name: &str) -> String {
    match metrics.get(name) {
        Some(value) if !value.is_insufficient() => value.display(),
        _ => "n/a".to_string(),
    }
}

fn board_summary(input: &BoardInput<'_>) -> String {
    let metrics = input.metrics;
    if input.board.records.is_empty() {
        return format!("{}: no records available.", input.board.category.label());
    }
    match input.board.category {
        BoardCategory::Deal => format!(
            "Pipeline: {} deals worth {} in total, win rate {}, weighted forecast {}, {} stalled.",
            metric_text(metrics, "total_deals"),
            metric_text(metrics, "total_value"),
            metric_text(metrics, "win_rate"),
            metric_text(metrics, "forecast"),
            metric_text(metrics, "stalled_deals"),
        ),
        BoardCategory::WorkOrder => format!(
            "Execution: {} work orders, completion rate {}, on-time rate {}, {} overdue, {} blocked.",
            metric_text(metrics, "total_work_orders"),
            metric_text(metrics, "completion_rate"),
            metric_text(metrics, "on_time_rate"),
            metric_text(metrics, "at_risk_count"),
            metric_text(metrics, "blocked_items"),
        ),
    }
}

fn template_summary(intent: Intent, inputs: &[BoardInput<'_>], caveats: &[String]) -> String {
    let mut parts: Vec<String> = inputs.iter().map(board_summary).collect();
    if parts.is_empty() {
        parts.push(format!("No {} data is loaded yet.", intent.as_str()));
    }
    if !caveats.is_empty() {
        parts.push(format!("{} data caveat(s) apply.", caveats.len()));
    }
    parts.join(" ")
}
