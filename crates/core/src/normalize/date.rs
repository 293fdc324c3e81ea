//! Calendar-date parsing with a fixed fallback order.
//!
//! 1. strict ISO-8601 (`YYYY-MM-DD`, or the date part of an RFC 3339 timestamp)
//! 2. US numeric `MM/DD/YYYY`
//! 3. EU numeric `DD/MM/YYYY`
//! 4. fuzzy free text ("March 15 2024", "15 Mar 24")
//!
//! Numeric dates accept `/`, `.` or `-` as separator. When both leading parts
//! are 12 or below the value is read as US; see [`AMBIGUOUS_DATE_POLICY`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::domain::{FieldValue, RawValue};

/// How a numeric date whose day and month are both <= 12 is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmbiguousDatePolicy {
    PreferUs,
    PreferEu,
}

pub const AMBIGUOUS_DATE_POLICY: AmbiguousDatePolicy = AmbiguousDatePolicy::PreferUs;

// chrono reads month names in either form for `%b` and `%B`, and `%Y` happily
// takes "24" as year 24, so two-digit years get their own table.
const FUZZY_DATE_FORMATS: &[&str] =
    &["%B %d %Y", "%d %B %Y", "%Y %B %d", "%Y/%m/%d", "%Y.%m.%d", "%Y-%m-%d"];

const FUZZY_SHORT_YEAR_FORMATS: &[&str] = &["%B %d %y", "%d %B %y"];

const FUZZY_DATETIME_FORMATS: &[&str] =
    &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

pub fn normalize_date(raw: &RawValue) -> FieldValue<NaiveDate> {
    if raw.is_blank() {
        return FieldValue::missing();
    }
    // Spreadsheet exports occasionally hand over numbers; a bare number is not a date.
    let Some(text) = raw.as_text() else {
        return FieldValue::failed();
    };
    parse_date_text(&text)
}

pub fn parse_date_text(text: &str) -> FieldValue<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return FieldValue::missing();
    }

    if let Some(date) = parse_iso(text) {
        return FieldValue::clean(date);
    }
    if let Some(date) = parse_numeric(text) {
        return FieldValue::coerced(date);
    }
    if let Some(date) = parse_fuzzy(text) {
        return FieldValue::coerced(date);
    }

    tracing::debug!(event_name = "normalize.date.failed", input = text, "unparseable date");
    FieldValue::failed()
}

fn parse_iso(text: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        // chrono accepts single-digit parts; strict ISO does not.
        if text.len() == 10 {
            return Some(date);
        }
    }
    DateTime::parse_from_rfc3339(text).ok().map(|timestamp| timestamp.date_naive())
}

fn parse_numeric(text: &str) -> Option<NaiveDate> {
    let separator = ['/', '.', '-'].into_iter().find(|sep| text.contains(*sep))?;
    let parts: Vec<&str> = text.split(separator).collect();
    if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    if !parts.iter().all(|part| part.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    // Year-first numerics belong to ISO or fuzzy parsing.
    if parts[0].len() > 2 || parts[1].len() > 2 {
        return None;
    }

    let first: u32 = parts[0].parse().ok()?;
    let second: u32 = parts[1].parse().ok()?;
    let year = expand_year(parts[2])?;

    let us = NaiveDate::from_ymd_opt(year, first, second);
    let eu = NaiveDate::from_ymd_opt(year, second, first);

    match (us, eu, AMBIGUOUS_DATE_POLICY) {
        (Some(us), Some(_), AmbiguousDatePolicy::PreferUs) => Some(us),
        (Some(_), Some(eu), AmbiguousDatePolicy::PreferEu) => Some(eu),
        (Some(us), None, _) => Some(us),
        (None, Some(eu), _) => Some(eu),
        (None, None, _) => None,
    }
}

fn expand_year(part: &str) -> Option<i32> {
    let year: i32 = part.parse().ok()?;
    match part.len() {
        4 => Some(year),
        2 => Some(2000 + year),
        _ => None,
    }
}

fn parse_fuzzy(text: &str) -> Option<NaiveDate> {
    let cleaned = clean_free_text(text);

    let short_year = cleaned
        .rsplit(' ')
        .next()
        .is_some_and(|last| last.len() == 2 && last.chars().all(|c| c.is_ascii_digit()));
    let formats = if short_year { FUZZY_SHORT_YEAR_FORMATS } else { FUZZY_DATE_FORMATS };

    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date);
        }
    }
    for format in FUZZY_DATETIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(timestamp.date());
        }
    }
    None
}

/// Drops commas and ordinal suffixes ("1st", "22nd") and collapses whitespace.
fn clean_free_text(text: &str) -> String {
    text.replace(',', " ")
        .split_whitespace()
        .map(strip_ordinal)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_ordinal(token: &str) -> &str {
    let lower = token.to_ascii_lowercase();
    for suffix in ["st", "nd", "rd", "th"] {
        if lower.ends_with(suffix) {
            let head = &token[..token.len() - suffix.len()];
            if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
                return head;
            }
        }
    }
    token
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use super::{normalize_date, parse_date_text};
    use crate::domain::RawValue;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn iso_dates_are_identity_without_coercion() {
        let mut day = ymd(2000, 1, 1);
        while day.year() < 2031 {
            let text = day.format("%Y-%m-%d").to_string();
            let parsed = parse_date_text(&text);
            assert_eq!(parsed.value, Some(day), "{text}");
            assert!(!parsed.was_coerced, "{text} should not be coerced");
            day = day + chrono::Duration::days(17);
        }
    }

    #[test]
    fn timestamps_keep_their_date_part() {
        let parsed = parse_date_text("2024-03-15T10:30:00Z");
        assert_eq!(parsed.value, Some(ymd(2024, 3, 15)));
        assert!(!parsed.was_coerced);
    }

    #[test]
    fn ambiguous_numeric_dates_resolve_to_us_order() {
        let parsed = parse_date_text("03/04/2024");
        assert_eq!(parsed.value, Some(ymd(2024, 3, 4)));
        assert!(parsed.was_coerced);
    }

    #[test]
    fn day_above_twelve_falls_back_to_eu_order() {
        assert_eq!(parse_date_text("25/12/2024").value, Some(ymd(2024, 12, 25)));
        assert_eq!(parse_date_text("12/25/2024").value, Some(ymd(2024, 12, 25)));
        assert_eq!(parse_date_text("25.12.2024").value, Some(ymd(2024, 12, 25)));
    }

    #[test]
    fn fuzzy_free_text_is_coerced() {
        for (input, expected) in [
            ("March 15 2024", ymd(2024, 3, 15)),
            ("March 15, 2024", ymd(2024, 3, 15)),
            ("15 Mar 24", ymd(2024, 3, 15)),
            ("Jan 2nd 2025", ymd(2025, 1, 2)),
            ("2024/06/30", ymd(2024, 6, 30)),
        ] {
            let parsed = parse_date_text(input);
            assert_eq!(parsed.value, Some(expected), "{input}");
            assert!(parsed.was_coerced, "{input}");
        }
    }

    #[test]
    fn garbage_fails_without_panicking() {
        let parsed = parse_date_text("next tuesday-ish");
        assert_eq!(parsed.value, None);
        assert!(parsed.coercion_failed);

        let invalid = parse_date_text("13/13/2024");
        assert!(invalid.coercion_failed);
    }

    #[test]
    fn out_of_range_years_are_retained() {
        assert_eq!(parse_date_text("1999-12-31").value, Some(ymd(1999, 12, 31)));
        assert_eq!(parse_date_text("2099-01-01").value, Some(ymd(2099, 1, 1)));
    }

    #[test]
    fn blank_and_structured_inputs() {
        assert!(normalize_date(&RawValue::Null).is_missing());
        assert!(!normalize_date(&RawValue::Text("   ".into())).coercion_failed);

        let structured = RawValue::Structured(serde_json::json!({"date": "2024-02-01"}));
        assert_eq!(normalize_date(&structured).value, Some(ymd(2024, 2, 1)));
    }
}
