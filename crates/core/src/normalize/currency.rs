use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::{FieldValue, RawValue};

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '₹'];
const CURRENCY_CODES: &[&str] = &["USD", "EUR", "GBP", "INR"];

pub fn normalize_currency(raw: &RawValue) -> FieldValue<Decimal> {
    match raw {
        RawValue::Number(number) => match decimal_from_f64(*number) {
            Some(amount) => FieldValue::clean(amount),
            None => FieldValue::failed(),
        },
        _ if raw.is_blank() => FieldValue::missing(),
        _ => match raw.as_text() {
            Some(text) => parse_currency_text(&text),
            None => FieldValue::failed(),
        },
    }
}

pub(crate) fn decimal_from_f64(number: f64) -> Option<Decimal> {
    if !number.is_finite() {
        return None;
    }
    Decimal::from_str(&number.to_string()).ok()
}

/// Parses a money string. Plain `-?digits(.digits)?` input is clean; anything
/// that needed symbol stripping or separator interpretation is coerced.
pub fn parse_currency_text(text: &str) -> FieldValue<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return FieldValue::missing();
    }

    if is_plain_number(trimmed) {
        if let Ok(amount) = Decimal::from_str(trimmed) {
            return FieldValue::clean(amount);
        }
    }

    match parse_formatted(trimmed) {
        Some(amount) => FieldValue::coerced(amount),
        None => {
            tracing::debug!(
                event_name = "normalize.currency.failed",
                input = trimmed,
                "unparseable amount"
            );
            FieldValue::failed()
        }
    }
}

fn is_plain_number(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    let mut parts = body.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.map_or(true, |f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

fn parse_formatted(text: &str) -> Option<Decimal> {
    let mut body: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    for code in CURRENCY_CODES {
        body = body.replace(code, "");
        body = body.replace(&code.to_lowercase(), "");
    }
    body.retain(|c| !CURRENCY_SYMBOLS.contains(&c));

    let mut negative = false;
    if let Some(inner) = body.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        negative = true;
        body = inner.to_string();
    }
    if let Some(rest) = body.strip_prefix('-') {
        negative = !negative;
        body = rest.to_string();
    } else if let Some(rest) = body.strip_suffix('-') {
        negative = !negative;
        body = rest.to_string();
    }

    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }

    let canonical = canonical_digits(&body)?;
    let amount = Decimal::from_str(&canonical).ok()?;
    Some(if negative { -amount } else { amount })
}

/// Rewrites a grouped number into `digits(.digits)?` form.
fn canonical_digits(body: &str) -> Option<String> {
    let commas = body.matches(',').count();
    let dots = body.matches('.').count();

    let decimal_separator = match (commas, dots) {
        (0, 0) => None,
        (_, 0) => single_separator_role(body, ',', commas),
        (0, _) => single_separator_role(body, '.', dots),
        // Both present: whichever comes last is the decimal point.
        _ => {
            let last_comma = body.rfind(',')?;
            let last_dot = body.rfind('.')?;
            let decimal = if last_comma > last_dot { ',' } else { '.' };
            if body.matches(decimal).count() > 1 {
                return None;
            }
            Some(decimal)
        }
    };

    let mut canonical = String::with_capacity(body.len());
    for c in body.chars() {
        match c {
            '0'..='9' => canonical.push(c),
            c if Some(c) == decimal_separator => canonical.push('.'),
            _ => {}
        }
    }
    if canonical.is_empty() || canonical == "." {
        return None;
    }
    Some(canonical)
}

/// Role of the only separator type present: `Some(sep)` when it is the
/// decimal point, `None` when it groups thousands.
fn single_separator_role(body: &str, separator: char, occurrences: usize) -> Option<char> {
    if occurrences > 1 {
        return None;
    }
    let trailing = body.rsplit(separator).next().map_or(0, str::len);
    if trailing == 3 {
        None
    } else {
        Some(separator)
    }
}
