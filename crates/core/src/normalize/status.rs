use crate::domain::{FieldValue, RawValue, RecordStatus};
use crate::rules::{synonym_key, RuleTables};

/// Outcome of mapping a status cell.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusOutcome {
    pub status: FieldValue<RecordStatus>,
    /// Original text when nothing in the synonym table matched, or when the
    /// text named conflicting statuses.
    pub unrecognized: Option<String>,
}

/// Tokens that cancel the synonym directly after them ("not won").
const NEGATIONS: &[&str] = &["not", "no", "never"];

/// Synonym lookup compiled from [`RuleTables`]: exact key first, then whole
/// phrases contained in the text. Contained phrases that disagree on the
/// canonical value yield no match.
#[derive(Clone, Debug)]
pub struct SynonymTable<T> {
    entries: Vec<SynonymEntry<T>>,
}

#[derive(Clone, Debug)]
struct SynonymEntry<T> {
    key: String,
    words: Vec<String>,
    value: T,
}

impl<T: Clone + PartialEq> SynonymTable<T> {
    pub fn new(pairs: impl IntoIterator<Item = (String, T)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(synonym, value)| SynonymEntry {
                key: synonym_key(&synonym),
                words: phrase_words(&synonym),
                value,
            })
            .filter(|entry| !entry.words.is_empty())
            .collect();
        Self { entries }
    }

    /// `Some((value, exact))` for a match.
    pub fn lookup(&self, input: &str) -> Option<(T, bool)> {
        let key = synonym_key(input);
        if key.is_empty() {
            return None;
        }
        if let Some(entry) = self.entries.iter().find(|entry| entry.key == key) {
            return Some((entry.value.clone(), true));
        }

        let words = phrase_words(input);
        let matched: Vec<&SynonymEntry<T>> = self
            .entries
            .iter()
            .filter(|entry| occurs_unnegated(&words, &entry.words))
            .collect();
        // "closed won" absorbs the "closed" and "won" it contains.
        let mut values = matched
            .iter()
            .filter(|entry| {
                !matched.iter().any(|other| {
                    other.words.len() > entry.words.len() && positions(&other.words, &entry.words).next().is_some()
                })
            })
            .map(|entry| &entry.value);

        let first = values.next()?;
        if values.all(|value| value == first) {
            Some((first.clone(), false))
        } else {
            None
        }
    }
}

fn phrase_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Start indexes where `phrase` appears as consecutive words of `words`.
fn positions<'a>(words: &'a [String], phrase: &'a [String]) -> impl Iterator<Item = usize> + 'a {
    words
        .windows(phrase.len())
        .enumerate()
        .filter(move |(_, window)| *window == phrase)
        .map(|(start, _)| start)
}

fn occurs_unnegated(words: &[String], phrase: &[String]) -> bool {
    positions(words, phrase).any(|start| {
        start == 0 || !NEGATIONS.contains(&words[start - 1].as_str())
    })
}

pub fn status_table(rules: &RuleTables) -> SynonymTable<RecordStatus> {
    SynonymTable::new(rules.status_synonyms.iter().flat_map(|entry| {
        entry.synonyms.iter().map(move |synonym| (synonym.clone(), entry.status))
    }))
}

pub fn stage_table(rules: &RuleTables) -> SynonymTable<String> {
    let canonical = rules.stage_order.iter().map(|stage| (stage.clone(), stage.clone()));
    let synonyms = rules.stage_synonyms.iter().flat_map(|entry| {
        entry.synonyms.iter().map(move |synonym| (synonym.clone(), entry.stage.clone()))
    });
    SynonymTable::new(canonical.chain(synonyms))
}

pub fn normalize_status(raw: &RawValue, table: &SynonymTable<RecordStatus>) -> StatusOutcome {
    let Some(text) = raw.as_text() else {
        return StatusOutcome { status: FieldValue::missing(), unrecognized: None };
    };

    match table.lookup(&text) {
        Some((status, true)) => StatusOutcome { status: FieldValue::clean(status), unrecognized: None },
        Some((status, false)) => {
            StatusOutcome { status: FieldValue::coerced(status), unrecognized: None }
        }
        None => {
            tracing::debug!(
                event_name = "normalize.status.unrecognized",
                input = %text,
                "status fell through to OTHER"
            );
            StatusOutcome { status: FieldValue::coerced(RecordStatus::Other), unrecognized: Some(text) }
        }
    }
}

/// Unknown stages are kept verbatim (trimmed) and marked coerced so the funnel
/// can still count them after the canonical sequence.
pub fn normalize_stage(raw: &RawValue, table: &SynonymTable<String>) -> FieldValue<String> {
    let Some(text) = raw.as_text() else {
        return FieldValue::missing();
    };
    match table.lookup(&text) {
        Some((stage, true)) => FieldValue::clean(stage),
        Some((stage, false)) => FieldValue::coerced(stage),
        None => FieldValue::coerced(synonym_key(&text).replace(' ', "_")),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_stage, normalize_status, stage_table, status_table};
    use crate::domain::{RawValue, RecordStatus};
    use crate::rules::RuleTables;

    #[test]
    fn case_and_separator_variants_map_exactly() {
        let table = status_table(&RuleTables::default());
        for input in ["in progress", "In-Progress", " IN_PROGRESS ", "ongoing"] {
            let outcome = normalize_status(&RawValue::from(input), &table);
            assert_eq!(outcome.status.value, Some(RecordStatus::InProgress), "{input}");
            assert!(!outcome.status.was_coerced, "{input}");
        }
    }

    #[test]
    fn containment_match_is_coerced() {
        let table = status_table(&RuleTables::default());
        let outcome = normalize_status(&RawValue::from("Deal closed won (Q3)"), &table);
        assert_eq!(outcome.status.value, Some(RecordStatus::Won));
        assert!(outcome.status.was_coerced);
    }

    #[test]
    fn conflicting_or_negated_statuses_become_other() {
        let table = status_table(&RuleTables::default());
        for input in ["Lost - closed", "Not won"] {
            let outcome = normalize_status(&RawValue::from(input), &table);
            assert_eq!(outcome.status.value, Some(RecordStatus::Other), "{input}");
            assert_eq!(outcome.unrecognized.as_deref(), Some(input), "{input}");
        }

        // Punctuation does not split the "closed lost" phrase.
        let outcome = normalize_status(&RawValue::from("Closed (lost)"), &table);
        assert_eq!(outcome.status.value, Some(RecordStatus::Lost));
        assert!(outcome.status.was_coerced);
    }

    #[test]
    fn negation_inside_a_synonym_still_matches() {
        let table = status_table(&RuleTables::default());
        let outcome = normalize_status(&RawValue::from("Not started yet"), &table);
        assert_eq!(outcome.status.value, Some(RecordStatus::NotStarted));
        assert!(outcome.status.was_coerced);
    }

    #[test]
    fn unknown_status_becomes_other_and_keeps_text() {
        let table = status_table(&RuleTables::default());
        let outcome = normalize_status(&RawValue::from("Zombie"), &table);
        assert_eq!(outcome.status.value, Some(RecordStatus::Other));
        assert_eq!(outcome.unrecognized.as_deref(), Some("Zombie"));
    }

    #[test]
    fn missing_status_is_not_other() {
        let table = status_table(&RuleTables::default());
        let outcome = normalize_status(&RawValue::Null, &table);
        assert!(outcome.status.is_missing());
        assert!(outcome.unrecognized.is_none());
    }

    #[test]
    fn stages_map_to_canonical_names() {
        let table = stage_table(&RuleTables::default());
        assert_eq!(normalize_stage(&RawValue::from("Proposal Sent"), &table).value.as_deref(), Some("proposal"));
        assert_eq!(normalize_stage(&RawValue::from("Legal Review"), &table).value.as_deref(), Some("legal_review"));

        let custom = normalize_stage(&RawValue::from("Pilot Running"), &table);
        assert_eq!(custom.value.as_deref(), Some("pilot_running"));
        assert!(custom.was_coerced);
    }
}
