//! Quality Auditor.
//!
//! Reads a normalized table and reports per-column missing/coerced rates plus
//! discrete issues. Never mutates the table; the same input always yields the
//! same report.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{BoardCategory, Column, NormalizedRecord, RecordStatus};

pub const DEFAULT_MISSING_DATA_THRESHOLD: f64 = 0.10;
pub const MIN_PLAUSIBLE_YEAR: i32 = 2000;
/// Years past the current one still considered plausible.
pub const MAX_YEARS_AHEAD: i32 = 5;

const DEAL_COLUMNS: &[Column] = &[
    Column::Name,
    Column::Status,
    Column::Stage,
    Column::Amount,
    Column::Probability,
    Column::Owner,
    Column::CloseDate,
];

const WORK_ORDER_COLUMNS: &[Column] = &[
    Column::Name,
    Column::Status,
    Column::Priority,
    Column::Owner,
    Column::StartDate,
    Column::TargetDate,
    Column::ActualDate,
];

const DATE_COLUMNS: &[Column] =
    &[Column::CloseDate, Column::StartDate, Column::TargetDate, Column::ActualDate, Column::CreatedAt];

pub fn audited_columns(category: BoardCategory) -> &'static [Column] {
    match category {
        BoardCategory::Deal => DEAL_COLUMNS,
        BoardCategory::WorkOrder => WORK_ORDER_COLUMNS,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    MissingData,
    DuplicateId,
    FutureDate,
    DateOutOfRange,
    NegativeAmount,
    ZeroAmount,
    ProbabilityOutOfRange,
    UnrecognizedStatus,
    CoercionFailed,
    GeneratedId,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingData => "MISSING_DATA",
            Self::DuplicateId => "DUPLICATE_ID",
            Self::FutureDate => "FUTURE_DATE",
            Self::DateOutOfRange => "DATE_OUT_OF_RANGE",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::ProbabilityOutOfRange => "PROBABILITY_OUT_OF_RANGE",
            Self::UnrecognizedStatus => "UNRECOGNIZED_STATUS",
            Self::CoercionFailed => "COERCION_FAILED",
            Self::GeneratedId => "GENERATED_ID",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub kind: IssueKind,
    pub column: Column,
    pub record_ids: Vec<String>,
    pub severity: Severity,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnQuality {
    pub missing_rate: f64,
    pub coerced_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub category: BoardCategory,
    pub total_records: usize,
    pub columns: BTreeMap<Column, ColumnQuality>,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn empty(category: BoardCategory) -> Self {
        Self { category, total_records: 0, columns: BTreeMap::new(), issues: Vec::new() }
    }

    pub fn issues_at_least(&self, severity: Severity) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(move |issue| issue.severity >= severity)
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    /// Column with the highest missing rate, ties broken by column order.
    pub fn worst_missing_column(&self) -> Option<(Column, f64)> {
        self.columns
            .iter()
            .map(|(column, quality)| (*column, quality.missing_rate))
            .fold(None, |best, (column, rate)| match best {
                Some((_, best_rate)) if best_rate >= rate => best,
                _ => Some((column, rate)),
            })
    }
}

#[derive(Clone, Debug)]
pub struct QualityAuditor {
    /// A column whose missing rate is strictly above this fraction is reported.
    pub missing_data_threshold: f64,
}

impl Default for QualityAuditor {
    fn default() -> Self {
        Self { missing_data_threshold: DEFAULT_MISSING_DATA_THRESHOLD }
    }
}

impl QualityAuditor {
    pub fn new(missing_data_threshold: f64) -> Self {
        Self { missing_data_threshold }
    }

    pub fn audit(
        &self,
        category: BoardCategory,
        records: &[NormalizedRecord],
        today: NaiveDate,
    ) -> QualityReport {
        let mut report = QualityReport::empty(category);
        report.total_records = records.len();

        // ---------------------------------------------------------------
        // Column rates
        // ---------------------------------------------------------------
        for column in audited_columns(category) {
            // actual_date is only expected once work is completed.
            let population: Vec<&NormalizedRecord> = records
                .iter()
                .filter(|record| *column != Column::ActualDate || is_completed(record))
                .collect();
            let quality = column_quality(&population, *column);
            report.columns.insert(*column, quality);

            if quality.missing_rate > self.missing_data_threshold {
                let ids = population
                    .iter()
                    .filter(|record| record.field_state(*column).missing)
                    .map(|record| record.id.clone())
                    .collect();
                report.issues.push(QualityIssue {
                    kind: IssueKind::MissingData,
                    column: *column,
                    record_ids: ids,
                    severity: Severity::Warning,
                    message: format!(
                        "{} of {} records are missing {}",
                        percent(quality.missing_rate),
                        category,
                        column.as_str()
                    ),
                });
            }
        }

        // ---------------------------------------------------------------
        // Duplicate ids
        // ---------------------------------------------------------------
        let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
        for record in records {
            *occurrences.entry(record.id.as_str()).or_default() += 1;
        }
        for (id, count) in occurrences.into_iter().filter(|(_, count)| *count > 1) {
            report.issues.push(QualityIssue {
                kind: IssueKind::DuplicateId,
                column: Column::Id,
                record_ids: vec![id.to_string(); count],
                severity: Severity::Warning,
                message: format!("id `{id}` is shared by {count} {category} records"),
            });
        }

        // ---------------------------------------------------------------
        // Anomalies
        // ---------------------------------------------------------------
        let max_year = today.year() + MAX_YEARS_AHEAD;
        for column in [Column::CloseDate, Column::TargetDate] {
            let ids = matching_ids(records, |record| {
                record.date(column).is_some_and(|date| date > today)
            });
            push_aggregate(&mut report, IssueKind::FutureDate, column, Severity::Info, ids, |n| {
                format!("{n} record(s) have {} after {today}", column.as_str())
            });
        }
        for column in DATE_COLUMNS {
            let ids = matching_ids(records, |record| {
                record.date(*column).is_some_and(|date| {
                    date.year() < MIN_PLAUSIBLE_YEAR || date.year() > max_year
                })
            });
            push_aggregate(&mut report, IssueKind::DateOutOfRange, *column, Severity::Warning, ids, |n| {
                format!(
                    "{n} record(s) have {} outside {MIN_PLAUSIBLE_YEAR}..={max_year}",
                    column.as_str()
                )
            });
        }

        let negative = matching_ids(records, |record| {
            record.amount.get().is_some_and(|amount| amount.is_sign_negative() && !amount.is_zero())
        });
        push_aggregate(&mut report, IssueKind::NegativeAmount, Column::Amount, Severity::Warning, negative, |n| {
            format!("{n} record(s) have a negative amount")
        });
        let zero = matching_ids(records, |record| record.amount.get() == Some(&Decimal::ZERO));
        push_aggregate(&mut report, IssueKind::ZeroAmount, Column::Amount, Severity::Info, zero, |n| {
            format!("{n} record(s) have a zero amount")
        });

        let clamped = matching_ids(records, |record| record.probability.out_of_range);
        push_aggregate(
            &mut report,
            IssueKind::ProbabilityOutOfRange,
            Column::Probability,
            Severity::Info,
            clamped,
            |n| format!("{n} record(s) had probability outside 0..=100 and were clamped"),
        );

        let unrecognized = matching_ids(records, |record| record.unrecognized_status.is_some());
        if !unrecognized.is_empty() {
            let mut values: Vec<&str> =
                records.iter().filter_map(|record| record.unrecognized_status.as_deref()).collect();
            values.sort_unstable();
            values.dedup();
            let listed = values.join(", ");
            push_aggregate(
                &mut report,
                IssueKind::UnrecognizedStatus,
                Column::Status,
                Severity::Info,
                unrecognized,
                |n| format!("{n} record(s) have unrecognized status values: {listed}"),
            );
        }

        for column in audited_columns(category) {
            let ids = matching_ids(records, |record| record.field_state(*column).coercion_failed);
            push_aggregate(&mut report, IssueKind::CoercionFailed, *column, Severity::Info, ids, |n| {
                format!("{n} record(s) have an unparseable {}", column.as_str())
            });
        }

        let generated = matching_ids(records, |record| record.id_generated);
        push_aggregate(&mut report, IssueKind::GeneratedId, Column::Id, Severity::Info, generated, |n| {
            format!("{n} record(s) had no id and were given a positional id")
        });

        tracing::debug!(
            event_name = "quality.audit.completed",
            category = %category,
            records = report.total_records,
            issues = report.issues.len(),
            "quality audit completed"
        );

        report
    }
}

fn is_completed(record: &NormalizedRecord) -> bool {
    record.status() == Some(RecordStatus::Completed)
}

fn column_quality(population: &[&NormalizedRecord], column: Column) -> ColumnQuality {
    if population.is_empty() {
        return ColumnQuality { missing_rate: 0.0, coerced_rate: 0.0 };
    }
    let total = population.len() as f64;
    let missing = population.iter().filter(|record| record.field_state(column).missing).count();
    let coerced = population.iter().filter(|record| record.field_state(column).was_coerced).count();
    ColumnQuality {
        missing_rate: round4(missing as f64 / total),
        coerced_rate: round4(coerced as f64 / total),
    }
}

fn matching_ids(
    records: &[NormalizedRecord],
    predicate: impl Fn(&NormalizedRecord) -> bool,
) -> Vec<String> {
    records.iter().filter(|record| predicate(*record)).map(|record| record.id.clone()).collect()
}

fn push_aggregate(
    report: &mut QualityReport,
    kind: IssueKind,
    column: Column,
    severity: Severity,
    record_ids: Vec<String>,
    message: impl FnOnce(usize) -> String,
) {
    if record_ids.is_empty() {
        return;
    }
    let message = message(record_ids.len());
    report.issues.push(QualityIssue { kind, column, record_ids, severity, message });
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{IssueKind, QualityAuditor, Severity};
    use crate::domain::{BoardCategory, Column, FieldValue, NormalizedRecord, RecordStatus};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
    }

    fn deal(id: &str, amount: Option<i64>) -> NormalizedRecord {
        let mut record = NormalizedRecord::empty(BoardCategory::Deal, id);
        record.name = FieldValue::clean(format!("Deal {id}"));
        record.status = FieldValue::clean(RecordStatus::Open);
        record.amount = match amount {
            Some(amount) => FieldValue::clean(Decimal::from(amount)),
            None => FieldValue::missing(),
        };
        record
    }

    fn deals_with_missing_amounts(total: usize, missing: usize) -> Vec<NormalizedRecord> {
        (0..total)
            .map(|index| deal(&format!("d{index}"), (index >= missing).then_some(1_000)))
            .collect()
    }

    #[test]
    fn fifteen_percent_missing_amount_is_reported() {
        let report = QualityAuditor::default().audit(
            BoardCategory::Deal,
            &deals_with_missing_amounts(20, 3),
            today(),
        );

        let issue = report
            .issues_of(IssueKind::MissingData)
            .find(|issue| issue.column == Column::Amount)
            .expect("missing amount issue");
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.record_ids, vec!["d0", "d1", "d2"]);
        assert_eq!(report.columns[&Column::Amount].missing_rate, 0.15);
    }

    #[test]
    fn five_percent_missing_amount_is_not_reported() {
        let report = QualityAuditor::default().audit(
            BoardCategory::Deal,
            &deals_with_missing_amounts(20, 1),
            today(),
        );

        assert!(!report
            .issues_of(IssueKind::MissingData)
            .any(|issue| issue.column == Column::Amount));
        assert_eq!(report.columns[&Column::Amount].missing_rate, 0.05);
    }

    #[test]
    fn duplicate_ids_yield_one_issue_listing_every_occurrence() {
        let records = vec![deal("d1", Some(10)), deal("d1", Some(20)), deal("d2", Some(30))];
        let report = QualityAuditor::default().audit(BoardCategory::Deal, &records, today());

        let duplicates: Vec<_> = report.issues_of(IssueKind::DuplicateId).collect();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].record_ids, vec!["d1", "d1"]);
        assert_eq!(duplicates[0].severity, Severity::Warning);
    }

    #[test]
    fn anomalies_are_flagged_with_expected_severity() {
        let mut future = deal("future", Some(10));
        future.close_date = FieldValue::clean(NaiveDate::from_ymd_opt(2024, 9, 1).expect("date"));
        let negative = deal("negative", Some(-50));
        let mut clamped = deal("clamped", Some(10));
        clamped.probability = FieldValue::clean(100).clamped();
        let mut ancient = deal("ancient", Some(10));
        ancient.close_date = FieldValue::clean(NaiveDate::from_ymd_opt(1999, 1, 1).expect("date"));

        let report = QualityAuditor::default().audit(
            BoardCategory::Deal,
            &[future, negative, clamped, ancient],
            today(),
        );

        let severity_of = |kind: IssueKind| {
            report.issues_of(kind).map(|issue| issue.severity).next().expect("issue present")
        };
        assert_eq!(severity_of(IssueKind::FutureDate), Severity::Info);
        assert_eq!(severity_of(IssueKind::NegativeAmount), Severity::Warning);
        assert_eq!(severity_of(IssueKind::ProbabilityOutOfRange), Severity::Info);
        assert_eq!(severity_of(IssueKind::DateOutOfRange), Severity::Warning);
    }

    #[test]
    fn actual_date_rate_only_counts_completed_work() {
        let mut done = NormalizedRecord::empty(BoardCategory::WorkOrder, "w1");
        done.status = FieldValue::clean(RecordStatus::Completed);
        done.actual_date = FieldValue::clean(NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"));
        let mut running = NormalizedRecord::empty(BoardCategory::WorkOrder, "w2");
        running.status = FieldValue::clean(RecordStatus::InProgress);

        let report =
            QualityAuditor::default().audit(BoardCategory::WorkOrder, &[done, running], today());
        assert_eq!(report.columns[&Column::ActualDate].missing_rate, 0.0);
    }

    #[test]
    fn auditing_twice_is_identical_and_does_not_mutate() {
        let records = deals_with_missing_amounts(10, 4);
        let before = records.clone();
        let auditor = QualityAuditor::default();

        let first = auditor.audit(BoardCategory::Deal, &records, today());
        let second = auditor.audit(BoardCategory::Deal, &records, today());

        assert_eq!(first, second);
        assert_eq!(records, before);
    }

    #[test]
    fn empty_table_has_zero_rates() {
        let report = QualityAuditor::default().audit(BoardCategory::Deal, &[], today());
        assert_eq!(report.total_records, 0);
        assert!(report.issues.is_empty());
        assert!(report.columns.values().all(|quality| quality.missing_rate == 0.0));
    }
}
