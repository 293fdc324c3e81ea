//! Metric Engine: pure aggregates over a normalized table.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{BoardCategory, NormalizedRecord, RecordStatus};

pub const DEFAULT_AT_RISK_TOP_N: usize = 10;

const AMOUNT_OVERFLOW: &str = "amount total overflowed";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub count: u64,
}

/// An overdue work order in the `at_risk` ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedItem {
    pub id: String,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub status: Option<RecordStatus>,
    pub target_date: NaiveDate,
    pub days_overdue: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Count(u64),
    Ratio(f64),
    Amount(Decimal),
    Distribution(Vec<Bucket>),
    Ranked(Vec<RankedItem>),
    /// The denominator was zero or no input values were present.
    InsufficientData { reason: String },
}

impl MetricValue {
    fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData { reason: reason.into() }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    /// Scalar view used by threshold rules. Collections yield their size.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Count(count) => Some(*count as f64),
            Self::Ratio(ratio) => Some(*ratio),
            Self::Amount(amount) => amount.to_f64(),
            Self::Distribution(buckets) => Some(buckets.iter().map(|b| b.count).sum::<u64>() as f64),
            Self::Ranked(items) => Some(items.len() as f64),
            Self::InsufficientData { .. } => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Count(count) => count.to_string(),
            Self::Ratio(ratio) => format!("{:.1}%", ratio * 100.0),
            Self::Amount(amount) => format_money(*amount),
            Self::Distribution(buckets) => buckets
                .iter()
                .map(|bucket| format!("{}: {}", bucket.label, bucket.count))
                .collect::<Vec<_>>()
                .join(", "),
            Self::Ranked(items) => items.len().to_string(),
            Self::InsufficientData { .. } => "insufficient data".to_string(),
        }
    }
}

/// `$1,234,567` for whole amounts, `$1,234.50` otherwise.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let absolute = rounded.abs();
    let whole = absolute.trunc();
    let fraction = absolute - whole;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let cents = if fraction.is_zero() {
        String::new()
    } else {
        let scaled = (fraction * Decimal::from(100)).round().to_u32().unwrap_or(0);
        format!(".{scaled:02}")
    };

    format!("{}${grouped}{cents}", if negative { "-" } else { "" })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub category: BoardCategory,
    pub metrics: BTreeMap<String, MetricValue>,
}

impl MetricSet {
    pub fn new(category: BoardCategory) -> Self {
        Self { category, metrics: BTreeMap::new() }
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    fn insert(&mut self, name: &str, value: MetricValue) {
        self.metrics.insert(name.to_string(), value);
    }
}

#[derive(Clone, Debug)]
pub struct MetricEngine {
    /// Canonical funnel order; stages outside it follow alphabetically.
    pub stage_order: Vec<String>,
    pub at_risk_top_n: usize,
}

impl MetricEngine {
    pub fn new(stage_order: Vec<String>, at_risk_top_n: usize) -> Self {
        Self { stage_order, at_risk_top_n }
    }

    pub fn compute(
        &self,
        category: BoardCategory,
        records: &[NormalizedRecord],
        today: NaiveDate,
    ) -> MetricSet {
        match category {
            BoardCategory::Deal => self.deal_metrics(records),
            BoardCategory::WorkOrder => self.work_order_metrics(records, today),
        }
    }

    fn deal_metrics(&self, records: &[NormalizedRecord]) -> MetricSet {
        let mut set = MetricSet::new(BoardCategory::Deal);
        set.insert("total_deals", MetricValue::Count(records.len() as u64));

        let won = count_status(records, |status| status == RecordStatus::Won);
        let lost = count_status(records, |status| status == RecordStatus::Lost);
        set.insert("win_rate", ratio(won, won + lost, "no deals are WON or LOST yet"));

        let mut amounts: Vec<Decimal> =
            records.iter().filter_map(|record| record.amount.get().copied()).collect();
        amounts.sort();
        set.insert("deals_with_value", MetricValue::Count(amounts.len() as u64));
        match (amounts.first(), amounts.last()) {
            (Some(smallest), Some(largest)) => {
                set.insert("smallest_deal", MetricValue::Amount(*smallest));
                set.insert("largest_deal", MetricValue::Amount(*largest));
                set.insert("median_deal_size", MetricValue::Amount(median(&amounts)));
                match checked_sum(amounts.iter().copied()) {
                    Some(total) => {
                        let mean = (total / Decimal::from(amounts.len() as u64)).round_dp(2);
                        set.insert("total_value", MetricValue::Amount(total));
                        set.insert("average_deal_size", MetricValue::Amount(mean));
                    }
                    None => {
                        for name in ["total_value", "average_deal_size"] {
                            set.insert(name, MetricValue::insufficient(AMOUNT_OVERFLOW));
                        }
                    }
                }
            }
            _ => {
                for name in [
                    "total_value",
                    "average_deal_size",
                    "median_deal_size",
                    "largest_deal",
                    "smallest_deal",
                ] {
                    set.insert(name, MetricValue::insufficient("no deal has a parseable amount"));
                }
            }
        }

        set.insert("stage_funnel", MetricValue::Distribution(self.stage_funnel(records)));

        let weighted: Vec<Option<Decimal>> = records
            .iter()
            .filter(|record| record.status().map_or(true, |status| status.is_open_deal()))
            .filter_map(|record| {
                let amount = record.amount.get()?;
                let probability = record.probability.get()?;
                Some(amount.checked_mul(Decimal::new(i64::from(*probability), 2)))
            })
            .collect();
        set.insert(
            "forecast",
            if weighted.is_empty() {
                MetricValue::insufficient("no open deal has both an amount and a probability")
            } else {
                match weighted.into_iter().collect::<Option<Vec<_>>>().and_then(checked_sum) {
                    Some(total) => MetricValue::Amount(total.round_dp(2)),
                    None => MetricValue::insufficient(AMOUNT_OVERFLOW),
                }
            },
        );

        set.insert("status_breakdown", MetricValue::Distribution(status_breakdown(records)));
        set.insert(
            "stalled_deals",
            MetricValue::Count(count_status(records, |status| {
                matches!(status, RecordStatus::Stuck | RecordStatus::Blocked | RecordStatus::OnHold)
            })),
        );

        set
    }

    fn stage_funnel(&self, records: &[NormalizedRecord]) -> Vec<Bucket> {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for record in records {
            if let Some(stage) = record.stage.get() {
                *counts.entry(stage.as_str()).or_default() += 1;
            }
        }

        let canonical: BTreeSet<&str> = self.stage_order.iter().map(String::as_str).collect();
        let mut funnel: Vec<Bucket> = self
            .stage_order
            .iter()
            .map(|stage| Bucket {
                label: stage.clone(),
                count: counts.get(stage.as_str()).copied().unwrap_or(0),
            })
            .collect();
        funnel.extend(
            counts
                .iter()
                .filter(|(stage, _)| !canonical.contains(*stage))
                .map(|(stage, count)| Bucket { label: stage.to_string(), count: *count }),
        );
        funnel
    }

    fn work_order_metrics(&self, records: &[NormalizedRecord], today: NaiveDate) -> MetricSet {
        let mut set = MetricSet::new(BoardCategory::WorkOrder);
        let total = records.len() as u64;
        set.insert("total_work_orders", MetricValue::Count(total));
        set.insert("status_breakdown", MetricValue::Distribution(status_breakdown(records)));

        let mut priorities: BTreeMap<&str, u64> = BTreeMap::new();
        for record in records {
            if let Some(priority) = record.priority.get() {
                *priorities.entry(priority.as_str()).or_default() += 1;
            }
        }
        set.insert(
            "priority_breakdown",
            MetricValue::Distribution(
                priorities
                    .into_iter()
                    .map(|(label, count)| Bucket { label: label.to_string(), count })
                    .collect(),
            ),
        );

        let completed: Vec<&NormalizedRecord> = records
            .iter()
            .filter(|record| record.status() == Some(RecordStatus::Completed))
            .collect();
        set.insert(
            "completion_rate",
            ratio(completed.len() as u64, total, "the work order board is empty"),
        );

        let on_time = completed
            .iter()
            .filter(|record| match (record.actual_date.get(), record.target_date.get()) {
                (Some(actual), Some(target)) => actual <= target,
                _ => false,
            })
            .count() as u64;
        set.insert(
            "on_time_rate",
            ratio(on_time, completed.len() as u64, "no work order is COMPLETED yet"),
        );

        let mut overdue: Vec<RankedItem> = records
            .iter()
            .filter(|record| record.status() != Some(RecordStatus::Completed))
            .filter_map(|record| {
                let target = *record.target_date.get()?;
                (target < today).then(|| RankedItem {
                    id: record.id.clone(),
                    name: record.name.get().cloned(),
                    owner: record.owner.get().cloned(),
                    status: record.status(),
                    target_date: target,
                    days_overdue: (today - target).num_days(),
                })
            })
            .collect();
        overdue.sort_by(|left, right| {
            left.target_date.cmp(&right.target_date).then_with(|| left.id.cmp(&right.id))
        });
        set.insert("at_risk_count", MetricValue::Count(overdue.len() as u64));
        overdue.truncate(self.at_risk_top_n);
        set.insert("at_risk", MetricValue::Ranked(overdue));

        set.insert(
            "blocked_items",
            MetricValue::Count(count_status(records, |status| {
                matches!(status, RecordStatus::Blocked | RecordStatus::Stuck)
            })),
        );

        set
    }
}

fn count_status(records: &[NormalizedRecord], predicate: impl Fn(RecordStatus) -> bool) -> u64 {
    records.iter().filter(|record| record.status().is_some_and(&predicate)).count() as u64
}

fn ratio(numerator: u64, denominator: u64, reason: &str) -> MetricValue {
    if denominator == 0 {
        return MetricValue::insufficient(reason);
    }
    MetricValue::Ratio(numerator as f64 / denominator as f64)
}

fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, |total, value| total.checked_add(value))
}

/// Halves before adding so two amounts near `Decimal::MAX` cannot overflow.
fn median(sorted: &[Decimal]) -> Decimal {
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[middle]
    } else {
        let two = Decimal::from(2);
        (sorted[middle - 1] / two + sorted[middle] / two).round_dp(2)
    }
}

fn status_breakdown(records: &[NormalizedRecord]) -> Vec<Bucket> {
    let mut counts: BTreeMap<RecordStatus, u64> = BTreeMap::new();
    for record in records {
        if let Some(status) = record.status() {
            *counts.entry(status).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(status, count)| Bucket { label: status.as_str().to_string(), count })
        .collect()
}
