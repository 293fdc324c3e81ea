//! Externally loadable lookup tables.
//!
//! Synonym mapping, column aliases, the question lexicon and the
//! insight/recommendation rules all live here as data. Built-in defaults cover
//! the common tracker vocabulary; a TOML file can replace any table without
//! touching control flow.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BoardCategory, Column, RecordStatus};

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("could not read rules file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse rules file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("rule table validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusSynonyms {
    pub status: RecordStatus,
    pub synonyms: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageSynonyms {
    pub stage: String,
    pub synonyms: Vec<String>,
}

/// Raw column names that map onto a canonical column. An empty `categories`
/// list applies the aliases to every board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldAliases {
    pub column: Column,
    #[serde(default)]
    pub categories: Vec<BoardCategory>,
    pub aliases: Vec<String>,
}

impl FieldAliases {
    pub fn applies_to(&self, category: BoardCategory) -> bool {
        self.categories.is_empty() || self.categories.contains(&category)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    pub pipeline: Vec<String>,
    pub execution: Vec<String>,
    pub overall: Vec<String>,
    pub details: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
        }
    }
}

/// `message` may contain `{value}`, replaced by the formatted metric value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRule {
    pub category: BoardCategory,
    pub metric: String,
    pub comparison: Comparison,
    pub threshold: f64,
    pub message: String,
}

impl MetricRule {
    fn new(
        category: BoardCategory,
        metric: &str,
        comparison: Comparison,
        threshold: f64,
        message: &str,
    ) -> Self {
        Self {
            category,
            metric: metric.to_string(),
            comparison,
            threshold,
            message: message.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    pub status_synonyms: Vec<StatusSynonyms>,
    /// Canonical deal-stage sequence used to order the funnel.
    pub stage_order: Vec<String>,
    pub stage_synonyms: Vec<StageSynonyms>,
    pub field_aliases: Vec<FieldAliases>,
    pub lexicon: Lexicon,
    pub insight_rules: Vec<MetricRule>,
    pub recommendation_rules: Vec<MetricRule>,
    pub default_recommendation: String,
    /// Missing rate above which a column earns a data-capture recommendation.
    pub critical_missing_rate: f64,
}

impl RuleTables {
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| RulesError::ReadFile { path: path.to_path_buf(), source })?;
        let tables = toml::from_str::<RuleTables>(&raw)
            .map_err(|source| RulesError::ParseFile { path: path.to_path_buf(), source })?;
        tables.validate()?;
        Ok(tables)
    }

    /// Loads `path` when given, otherwise returns the built-in tables.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, RulesError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        if self.stage_order.is_empty() {
            return Err(RulesError::Validation("stage_order must not be empty".to_string()));
        }

        let mut seen: HashMap<String, RecordStatus> = HashMap::new();
        for entry in &self.status_synonyms {
            for synonym in &entry.synonyms {
                let key = synonym_key(synonym);
                if key.is_empty() {
                    return Err(RulesError::Validation(format!(
                        "status synonym for {} is blank",
                        entry.status.as_str()
                    )));
                }
                if let Some(previous) = seen.insert(key.clone(), entry.status) {
                    if previous != entry.status {
                        return Err(RulesError::Validation(format!(
                            "status synonym `{key}` maps to both {} and {}",
                            previous.as_str(),
                            entry.status.as_str()
                        )));
                    }
                }
            }
        }

        for rule in self.insight_rules.iter().chain(&self.recommendation_rules) {
            if !rule.threshold.is_finite() {
                return Err(RulesError::Validation(format!(
                    "rule on `{}` has a non-finite threshold",
                    rule.metric
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.critical_missing_rate) {
            return Err(RulesError::Validation(
                "critical_missing_rate must be in range 0..=1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Lowercase, trim, treat `-`/`_` as spaces and collapse whitespace.
pub fn synonym_key(value: &str) -> String {
    value
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn status(status: RecordStatus, synonyms: &[&str]) -> StatusSynonyms {
    StatusSynonyms { status, synonyms: strings(synonyms) }
}

fn stage(stage: &str, synonyms: &[&str]) -> StageSynonyms {
    StageSynonyms { stage: stage.to_string(), synonyms: strings(synonyms) }
}

fn aliases(column: Column, categories: &[BoardCategory], aliases: &[&str]) -> FieldAliases {
    FieldAliases { column, categories: categories.to_vec(), aliases: strings(aliases) }
}

impl Default for RuleTables {
    fn default() -> Self {
        use BoardCategory::{Deal, WorkOrder};
        use Comparison::{Gt, Gte, Lt};

        Self {
            status_synonyms: vec![
                status(RecordStatus::NotStarted, &["not started", "to do", "todo", "backlog", "in backlog", "new", "planned"]),
                status(RecordStatus::Open, &["open", "active", "lead", "qualification", "qualifying", "discovery", "proposal", "proposal sent", "negotiation", "negotiating", "pending", "working"]),
                status(RecordStatus::InProgress, &["in progress", "inprogress", "ongoing", "working on it", "started", "wip"]),
                status(RecordStatus::Stuck, &["stuck", "stalled", "at risk"]),
                status(RecordStatus::Blocked, &["blocked", "waiting", "waiting on client"]),
                status(RecordStatus::OnHold, &["on hold", "paused", "deferred"]),
                status(RecordStatus::Won, &["won", "closed won", "win", "signed", "closed - won"]),
                status(RecordStatus::Lost, &["lost", "closed lost", "dead", "churned", "closed - lost"]),
                status(RecordStatus::Completed, &["completed", "complete", "done", "finished", "delivered", "closed"]),
                status(RecordStatus::Cancelled, &["cancelled", "canceled", "abandoned", "dropped"]),
            ],
            stage_order: strings(&[
                "lead",
                "qualification",
                "discovery",
                "proposal",
                "negotiation",
                "legal_review",
                "closed",
            ]),
            stage_synonyms: vec![
                stage("lead", &["lead", "new lead", "prospect", "initial call", "first contact"]),
                stage("qualification", &["qualification", "qualified", "qualifying", "sql"]),
                stage("discovery", &["discovery", "demo", "needs analysis"]),
                stage("proposal", &["proposal", "proposal sent", "quote sent", "pricing"]),
                stage("negotiation", &["negotiation", "negotiating", "commit"]),
                stage("legal_review", &["legal review", "legal", "contracting", "procurement"]),
                stage("closed", &["closed", "closed won", "closed lost", "won", "lost"]),
            ],
            field_aliases: vec![
                aliases(Column::Id, &[], &["id", "item id", "record id", "deal id", "order id"]),
                aliases(Column::Name, &[], &["name", "item", "title", "deal name", "order name", "deal", "work order", "project"]),
                aliases(Column::Status, &[], &["status", "deal status", "state", "order status", "execution status"]),
                aliases(Column::Stage, &[Deal], &["stage", "deal stage", "sales stage", "pipeline stage"]),
                aliases(Column::Amount, &[], &["amount", "deal amount", "deal value", "masked deal value", "value", "deal size", "contract value", "amount in rupees", "billed value"]),
                aliases(Column::Probability, &[Deal], &["probability", "win probability", "close probability", "closure probability", "likelihood"]),
                aliases(Column::Owner, &[], &["owner", "deal owner", "assignee", "assigned to", "person", "owner code"]),
                aliases(Column::Priority, &[WorkOrder], &["priority", "urgency", "severity"]),
                aliases(Column::CloseDate, &[Deal], &["close date", "closing date", "expected close date", "close date (a)", "tentative close date"]),
                aliases(Column::StartDate, &[], &["start date", "start", "kickoff date", "probable start date"]),
                aliases(Column::TargetDate, &[WorkOrder], &["target date", "target completion date", "due date", "deadline", "probable end date"]),
                aliases(Column::ActualDate, &[WorkOrder], &["actual date", "completion date", "actual completion date", "completed on", "date of completion"]),
                aliases(Column::CreatedAt, &[], &["created at", "created", "created date", "creation date"]),
            ],
            lexicon: Lexicon::default(),
            insight_rules: vec![
                MetricRule::new(Deal, "win_rate", Lt, 0.2, "Win rate of {value} is below the 20% industry benchmark"),
                MetricRule::new(Deal, "win_rate", Gte, 0.5, "Win rate of {value} is healthy: most closed deals convert"),
                MetricRule::new(Deal, "stalled_deals", Gt, 0.0, "{value} deal(s) are stalled and need attention"),
                MetricRule::new(Deal, "forecast", Gt, 0.0, "Probability-weighted forecast for open deals is {value}"),
                MetricRule::new(WorkOrder, "on_time_rate", Lt, 0.7, "Only {value} of completed work orders finished by their target date"),
                MetricRule::new(WorkOrder, "at_risk_count", Gt, 0.0, "{value} open work order(s) are past their target date"),
                MetricRule::new(WorkOrder, "completion_rate", Lt, 0.5, "Completion rate of {value} is below 50%"),
                MetricRule::new(WorkOrder, "blocked_items", Gt, 0.0, "{value} work order(s) are blocked or stuck"),
            ],
            recommendation_rules: vec![
                MetricRule::new(Deal, "win_rate", Lt, 0.2, "Review the sales process and tighten qualification to lift the win rate"),
                MetricRule::new(Deal, "stalled_deals", Gt, 0.0, "Prioritise intervention and customer outreach on the {value} stalled deal(s)"),
                MetricRule::new(WorkOrder, "at_risk_count", Gt, 0.0, "Triage the {value} overdue work order(s) and reset target dates with their owners"),
                MetricRule::new(WorkOrder, "completion_rate", Lt, 0.5, "Investigate blockers and resource constraints slowing project completion"),
                MetricRule::new(WorkOrder, "on_time_rate", Lt, 0.7, "Revisit estimation: too few work orders land by their target date"),
            ],
            default_recommendation:
                "Core metrics are stable. Focus on continuous monitoring and incremental optimisation"
                    .to_string(),
            critical_missing_rate: 0.3,
        }
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            pipeline: strings(&[
                "deal", "sales", "pipeline", "win rate", "opportunity", "opportunities",
                "forecast", "revenue", "average deal", "deal size", "close rate", "conversion",
                "negotiation", "customer", "client", "funnel", "probability", "quota",
                "sector", "prospect",
            ]),
            execution: strings(&[
                "work order", "project", "execution", "delivery", "completion", "bottleneck",
                "delayed", "overdue", "on time", "at risk", "task", "capacity", "blocked",
                "backlog", "deadline", "duration", "efficiency", "operations",
            ]),
            overall: strings(&[
                "overall", "health", "business", "everything", "summary", "focus",
                "leadership", "prioritize", "big picture", "going",
            ]),
            details: strings(&[
                "details", "list", "table", "show me", "breakdown", "give me", "who are", "which",
            ]),
        }
    }
}
