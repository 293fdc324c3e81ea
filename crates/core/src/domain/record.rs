use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::board::BoardCategory;

// ---------------------------------------------------------------------------
// Raw side
// ---------------------------------------------------------------------------

/// An untyped value exactly as the source delivered it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Number(f64),
    Text(String),
    Structured(serde_json::Value),
}

impl RawValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Structured(value) => value.is_null(),
            Self::Number(_) => false,
        }
    }

    /// Textual view of the value. Structured values yield their `label`,
    /// `name`, `date` or `text` member when present.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Number(number) => Some(number.to_string()),
            Self::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Self::Structured(value) => structured_text(value),
        }
    }
}

fn structured_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Object(map) => ["label", "name", "date", "text"]
            .iter()
            .find_map(|key| map.get(*key).and_then(structured_text)),
        _ => None,
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// One source item: field name to untyped value, tagged with its board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub category: BoardCategory,
    pub fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new(category: BoardCategory) -> Self {
        Self { category, fields: BTreeMap::new() }
    }

    pub fn with(mut self, field: &str, value: impl Into<RawValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }
}

/// Raw records grouped by board, the unit the on-disk cache stores.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecordSet(pub BTreeMap<BoardCategory, Vec<RawRecord>>);

impl RawRecordSet {
    pub fn records(&self, category: BoardCategory) -> &[RawRecord] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, category: BoardCategory, records: Vec<RawRecord>) {
        self.0.insert(category, records);
    }
}

// ---------------------------------------------------------------------------
// Normalized side
// ---------------------------------------------------------------------------

/// Canonical columns of the fixed record schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    Name,
    Status,
    Stage,
    Amount,
    Probability,
    Owner,
    Priority,
    CloseDate,
    StartDate,
    TargetDate,
    ActualDate,
    CreatedAt,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Status => "status",
            Self::Stage => "stage",
            Self::Amount => "amount",
            Self::Probability => "probability",
            Self::Owner => "owner",
            Self::Priority => "priority",
            Self::CloseDate => "close_date",
            Self::StartDate => "start_date",
            Self::TargetDate => "target_date",
            Self::ActualDate => "actual_date",
            Self::CreatedAt => "created_at",
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(
            self,
            Self::CloseDate | Self::StartDate | Self::TargetDate | Self::ActualDate | Self::CreatedAt
        )
    }
}

/// A typed field plus how it was obtained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldValue<T> {
    pub value: Option<T>,
    /// A fallback parse path produced the value.
    pub was_coerced: bool,
    /// Input was present but no parser accepted it.
    pub coercion_failed: bool,
    /// Input was outside the legal range and was clamped.
    pub out_of_range: bool,
}

impl<T> Default for FieldValue<T> {
    fn default() -> Self {
        Self::missing()
    }
}

impl<T> FieldValue<T> {
    pub fn missing() -> Self {
        Self { value: None, was_coerced: false, coercion_failed: false, out_of_range: false }
    }

    pub fn clean(value: T) -> Self {
        Self { value: Some(value), was_coerced: false, coercion_failed: false, out_of_range: false }
    }

    pub fn coerced(value: T) -> Self {
        Self { value: Some(value), was_coerced: true, coercion_failed: false, out_of_range: false }
    }

    pub fn failed() -> Self {
        Self { value: None, was_coerced: false, coercion_failed: true, out_of_range: false }
    }

    pub fn clamped(mut self) -> Self {
        self.out_of_range = true;
        self.was_coerced = true;
        self
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    fn state(&self) -> FieldState {
        FieldState {
            missing: self.value.is_none(),
            was_coerced: self.was_coerced,
            coercion_failed: self.coercion_failed,
            out_of_range: self.out_of_range,
        }
    }
}

/// Type-erased view of a [`FieldValue`] used by the auditor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldState {
    pub missing: bool,
    pub was_coerced: bool,
    pub coercion_failed: bool,
    pub out_of_range: bool,
}

/// Canonical lifecycle status shared by both boards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    NotStarted,
    Open,
    InProgress,
    Stuck,
    Blocked,
    OnHold,
    Won,
    Lost,
    Completed,
    Cancelled,
    Other,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Stuck => "STUCK",
            Self::Blocked => "BLOCKED",
            Self::OnHold => "ON_HOLD",
            Self::Won => "WON",
            Self::Lost => "LOST",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Other => "OTHER",
        }
    }

    /// Deal is still in play (neither closed nor abandoned).
    pub fn is_open_deal(&self) -> bool {
        !matches!(self, Self::Won | Self::Lost | Self::Cancelled | Self::Completed)
    }
}

/// A fixed-schema row produced by the normalizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub category: BoardCategory,
    /// Non-empty. Synthesized from the row position when the source had none.
    pub id: String,
    pub id_generated: bool,
    pub name: FieldValue<String>,
    pub status: FieldValue<RecordStatus>,
    /// Source text of the status when it did not map to a known status.
    pub unrecognized_status: Option<String>,
    pub stage: FieldValue<String>,
    pub amount: FieldValue<Decimal>,
    pub probability: FieldValue<u8>,
    pub owner: FieldValue<String>,
    pub priority: FieldValue<String>,
    pub close_date: FieldValue<NaiveDate>,
    pub start_date: FieldValue<NaiveDate>,
    pub target_date: FieldValue<NaiveDate>,
    pub actual_date: FieldValue<NaiveDate>,
    pub created_at: FieldValue<NaiveDate>,
    /// Source fields that matched no canonical column.
    pub extras: BTreeMap<String, RawValue>,
}

impl NormalizedRecord {
    pub fn empty(category: BoardCategory, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
            id_generated: false,
            name: FieldValue::missing(),
            status: FieldValue::missing(),
            unrecognized_status: None,
            stage: FieldValue::missing(),
            amount: FieldValue::missing(),
            probability: FieldValue::missing(),
            owner: FieldValue::missing(),
            priority: FieldValue::missing(),
            close_date: FieldValue::missing(),
            start_date: FieldValue::missing(),
            target_date: FieldValue::missing(),
            actual_date: FieldValue::missing(),
            created_at: FieldValue::missing(),
            extras: BTreeMap::new(),
        }
    }

    pub fn status(&self) -> Option<RecordStatus> {
        self.status.value
    }

    pub fn field_state(&self, column: Column) -> FieldState {
        match column {
            Column::Id => FieldState { was_coerced: self.id_generated, ..FieldState::default() },
            Column::Name => self.name.state(),
            Column::Status => self.status.state(),
            Column::Stage => self.stage.state(),
            Column::Amount => self.amount.state(),
            Column::Probability => self.probability.state(),
            Column::Owner => self.owner.state(),
            Column::Priority => self.priority.state(),
            Column::CloseDate => self.close_date.state(),
            Column::StartDate => self.start_date.state(),
            Column::TargetDate => self.target_date.state(),
            Column::ActualDate => self.actual_date.state(),
            Column::CreatedAt => self.created_at.state(),
        }
    }

    pub fn date(&self, column: Column) -> Option<NaiveDate> {
        match column {
            Column::CloseDate => self.close_date.value,
            Column::StartDate => self.start_date.value,
            Column::TargetDate => self.target_date.value,
            Column::ActualDate => self.actual_date.value,
            Column::CreatedAt => self.created_at.value,
            _ => None,
        }
    }
}
