use crate::domain::{FieldValue, RawValue};

/// Parses a win probability into whole percent.
///
/// `75`, `"75"` and `"75%"` are clean. Fractions strictly between 0 and 1
/// without a `%` suffix are read as ratios and scaled, non-integers are rounded, and anything outside
/// `0..=100` is clamped and marked out of range. Non-numeric input fails.
pub fn normalize_probability(raw: &RawValue) -> FieldValue<u8> {
    let mut percent_suffix = false;
    let number = match raw {
        RawValue::Number(number) => *number,
        _ if raw.is_blank() => return FieldValue::missing(),
        _ => {
            let Some(text) = raw.as_text() else {
                return FieldValue::failed();
            };
            let trimmed = text.trim();
            percent_suffix = trimmed.ends_with('%');
            let body = trimmed.trim_end_matches('%').trim();
            match body.parse::<f64>() {
                Ok(number) => number,
                Err(_) => {
                    tracing::debug!(
                        event_name = "normalize.probability.failed",
                        input = %text,
                        "non-numeric probability"
                    );
                    return FieldValue::failed();
                }
            }
        }
    };

    if !number.is_finite() {
        return FieldValue::failed();
    }

    let mut coerced = false;
    let mut percent = number;
    if !percent_suffix && percent > 0.0 && percent < 1.0 {
        percent *= 100.0;
        coerced = true;
    }
    if percent.fract() != 0.0 {
        percent = percent.round();
        coerced = true;
    }

    if percent < 0.0 {
        return FieldValue::clean(0).clamped();
    }
    if percent > 100.0 {
        return FieldValue::clean(100).clamped();
    }

    // In range after the checks above.
    let whole = percent as u8;
    if coerced {
        FieldValue::coerced(whole)
    } else {
        FieldValue::clean(whole)
    }
}
