//! Format Normalizer: raw field mappings to fixed-schema records.
//!
//! Never fails. Every field ends up as a value, a missing marker, or a
//! `coercion_failed` flag that the quality auditor picks up later.

pub mod currency;
pub mod date;
pub mod probability;
pub mod status;

use std::collections::{BTreeMap, HashMap};

use crate::domain::{
    BoardCategory, Column, FieldValue, NormalizedRecord, RawRecord, RawValue, RecordStatus,
};
use crate::rules::{synonym_key, RuleTables};

pub use currency::{normalize_currency, parse_currency_text};
pub use date::{normalize_date, parse_date_text, AmbiguousDatePolicy, AMBIGUOUS_DATE_POLICY};
pub use probability::normalize_probability;
pub use status::{normalize_stage, normalize_status, StatusOutcome, SynonymTable};

#[derive(Clone, Debug)]
pub struct Normalizer {
    statuses: SynonymTable<RecordStatus>,
    stages: SynonymTable<String>,
    columns: HashMap<(BoardCategory, String), Column>,
}

impl Normalizer {
    pub fn new(rules: &RuleTables) -> Self {
        let mut columns = HashMap::new();
        for entry in &rules.field_aliases {
            for category in BoardCategory::ALL {
                if !entry.applies_to(category) {
                    continue;
                }
                for alias in &entry.aliases {
                    columns.entry((category, synonym_key(alias))).or_insert(entry.column);
                }
            }
        }

        Self { statuses: status::status_table(rules), stages: status::stage_table(rules), columns }
    }

    pub fn resolve_column(&self, category: BoardCategory, field: &str) -> Option<Column> {
        self.columns.get(&(category, synonym_key(field))).copied()
    }

    pub fn normalize_table(&self, records: &[RawRecord]) -> Vec<NormalizedRecord> {
        records.iter().enumerate().map(|(index, raw)| self.normalize_record(raw, index)).collect()
    }

    /// `index` is the row position, used to synthesize an id when none is present.
    pub fn normalize_record(&self, raw: &RawRecord, index: usize) -> NormalizedRecord {
        let category = raw.category;
        let mut mapped: BTreeMap<Column, (&String, &RawValue)> = BTreeMap::new();
        let mut extras = BTreeMap::new();

        for (field, value) in &raw.fields {
            let Some(column) = self.resolve_column(category, field) else {
                extras.insert(field.clone(), value.clone());
                continue;
            };
            // First non-blank source wins when several fields alias one column.
            let replace = mapped.get(&column).map_or(true, |(_, current)| current.is_blank());
            if !replace {
                extras.insert(field.clone(), value.clone());
            } else if let Some((previous_field, previous)) = mapped.insert(column, (field, value)) {
                extras.insert(previous_field.clone(), previous.clone());
            }
        }

        let id_text = mapped.get(&Column::Id).and_then(|(_, value)| value.as_text());
        let (id, id_generated) = match id_text {
            Some(id) => (id, false),
            None => (format!("{category}-row-{}", index + 1), true),
        };

        let mut record = NormalizedRecord::empty(category, id);
        record.id_generated = id_generated;
        record.extras = extras;

        for (column, (_, value)) in mapped {
            match column {
                Column::Id => {}
                Column::Name => record.name = text_field(value),
                Column::Status => {
                    let outcome = normalize_status(value, &self.statuses);
                    record.status = outcome.status;
                    record.unrecognized_status = outcome.unrecognized;
                }
                Column::Stage => record.stage = normalize_stage(value, &self.stages),
                Column::Amount => record.amount = normalize_currency(value),
                Column::Probability => record.probability = normalize_probability(value),
                Column::Owner => record.owner = text_field(value),
                Column::Priority => record.priority = text_field(value),
                Column::CloseDate => record.close_date = normalize_date(value),
                Column::StartDate => record.start_date = normalize_date(value),
                Column::TargetDate => record.target_date = normalize_date(value),
                Column::ActualDate => record.actual_date = normalize_date(value),
                Column::CreatedAt => record.created_at = normalize_date(value),
            }
        }

        record
    }
}

fn text_field(value: &RawValue) -> FieldValue<String> {
    match value.as_text() {
        Some(text) => FieldValue::clean(text),
        None => FieldValue::missing(),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::Normalizer;
    use crate::domain::{BoardCategory, Column, RawRecord, RawValue, RecordStatus};
    use crate::rules::RuleTables;

    #[test]
    fn maps_aliased_titles_onto_schema() {
        let normalizer = Normalizer::new(&RuleTables::default());
        let raw = RawRecord::new(BoardCategory::Deal)
            .with("Item ID", "deal_001")
            .with("Name", "Acme Corp Expansion")
            .with("Deal Status", "Negotiation")
            .with("Deal Stage", "Proposal Sent")
            .with("Masked Deal value", "$125,000")
            .with("Closure Probability", "75%")
            .with("Owner code", "OWNER_001")
            .with("Tentative Close Date", "2024-03-15")
            .with("Sector/service", "Mining");

        let record = normalizer.normalize_record(&raw, 0);

        assert_eq!(record.id, "deal_001");
        assert!(!record.id_generated);
        assert_eq!(record.name.value.as_deref(), Some("Acme Corp Expansion"));
        assert_eq!(record.status(), Some(RecordStatus::Open));
        assert_eq!(record.stage.value.as_deref(), Some("proposal"));
        assert_eq!(record.amount.value, Some(Decimal::from_str("125000").expect("decimal")));
        assert_eq!(record.probability.value, Some(75));
        assert_eq!(record.owner.value.as_deref(), Some("OWNER_001"));
        assert_eq!(record.close_date.value, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(record.extras.get("Sector/service"), Some(&RawValue::from("Mining")));
    }

    #[test]
    fn aliases_respect_board_category() {
        let normalizer = Normalizer::new(&RuleTables::default());
        assert_eq!(
            normalizer.resolve_column(BoardCategory::WorkOrder, "Due Date"),
            Some(Column::TargetDate)
        );
        assert_eq!(normalizer.resolve_column(BoardCategory::Deal, "Due Date"), None);
        assert_eq!(normalizer.resolve_column(BoardCategory::Deal, "DEAL_STAGE"), Some(Column::Stage));
    }

    #[test]
    fn missing_id_is_synthesized_from_position() {
        let normalizer = Normalizer::new(&RuleTables::default());
        let raw = RawRecord::new(BoardCategory::WorkOrder).with("name", "Fit-out");
        let record = normalizer.normalize_record(&raw, 4);

        assert_eq!(record.id, "work_order-row-5");
        assert!(record.id_generated);
    }

    #[test]
    fn first_non_blank_alias_wins() {
        let normalizer = Normalizer::new(&RuleTables::default());
        let raw = RawRecord::new(BoardCategory::Deal)
            .with("amount", "")
            .with("deal value", "1,000");
        let record = normalizer.normalize_record(&raw, 0);

        assert_eq!(record.amount.value, Some(Decimal::from(1000)));
        assert!(record.extras.contains_key("amount"));
    }

    #[test]
    fn unparseable_fields_never_panic() {
        let normalizer = Normalizer::new(&RuleTables::default());
        let raw = RawRecord::new(BoardCategory::Deal)
            .with("id", "d9")
            .with("amount", "call me")
            .with("probability", "high")
            .with("close date", "someday");
        let record = normalizer.normalize_record(&raw, 0);

        assert!(record.amount.coercion_failed);
        assert!(record.probability.coercion_failed);
        assert!(record.close_date.coercion_failed);
    }
}
