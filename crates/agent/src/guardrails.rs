use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, detail: String, fallback_path: &'static str },
}

impl GuardrailDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Checks a model-written summary against the templated one it replaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub llm_can_introduce_numbers: bool,
    pub max_summary_chars: usize,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { llm_can_introduce_numbers: false, max_summary_chars: 1_200 }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, templated: &str, candidate: &str) -> GuardrailDecision {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return GuardrailDecision::Deny {
                reason_code: "empty_summary",
                detail: "model returned no text".to_string(),
                fallback_path: "templated_summary",
            };
        }
        if candidate.chars().count() > self.max_summary_chars {
            return GuardrailDecision::Deny {
                reason_code: "summary_too_long",
                detail: format!("summary exceeds {} characters", self.max_summary_chars),
                fallback_path: "templated_summary",
            };
        }
        if !self.llm_can_introduce_numbers {
            let known = numbers_in(templated);
            let introduced: Vec<String> =
                numbers_in(candidate).into_iter().filter(|number| !known.contains(number)).collect();
            if !introduced.is_empty() {
                return GuardrailDecision::Deny {
                    reason_code: "unsupported_numeric_claim",
                    detail: format!("summary introduced numbers {}", introduced.join(", ")),
                    fallback_path: "templated_summary",
                };
            }
        }
        GuardrailDecision::Allow
    }
}

/// Numeric tokens with grouping commas removed: `$1,250.50` and `1250.50`
/// compare equal.
pub fn numbers_in(text: &str) -> BTreeSet<String> {
    let mut numbers = BTreeSet::new();
    let mut current = String::new();

    for character in text.chars().chain(std::iter::once(' ')) {
        let continues = character.is_ascii_digit()
            || (!current.is_empty() && matches!(character, ',' | '.'));
        if continues {
            current.push(character);
            continue;
        }
        let token = current.trim_end_matches([',', '.']).replace(',', "");
        if !token.is_empty() {
            numbers.insert(token);
        }
        current.clear();
    }
    numbers
}

#[cfg(test)]
mod tests {
    use super::{numbers_in, GuardrailDecision, GuardrailPolicy};

    const TEMPLATE: &str =
        "Pipeline: 6 deals worth $635,500 in total, win rate 50.0%, weighted forecast $210,400.";

    #[test]
    fn rephrasing_with_known_numbers_is_allowed() {
        let decision = GuardrailPolicy::default().evaluate(
            TEMPLATE,
            "Six open opportunities aside, the win rate sits at 50.0% across 6 deals totalling $635,500.",
        );
        assert_eq!(decision, GuardrailDecision::Allow);
    }

    #[test]
    fn invented_number_is_denied() {
        let decision = GuardrailPolicy::default()
            .evaluate(TEMPLATE, "Win rate is 50.0% and should reach 65% next quarter.");

        let (reason_code, detail, fallback_path) = match decision {
            GuardrailDecision::Deny { reason_code, detail, fallback_path } => {
                (reason_code, detail, fallback_path)
            }
            GuardrailDecision::Allow => ("", String::new(), ""),
        };
        assert_eq!(reason_code, "unsupported_numeric_claim");
        assert!(detail.contains("65"));
        assert_eq!(fallback_path, "templated_summary");
    }

    #[test]
    fn empty_output_is_denied() {
        assert!(!GuardrailPolicy::default().evaluate(TEMPLATE, "   ").is_allowed());
    }

    #[test]
    fn numbers_ignore_grouping_and_trailing_punctuation() {
        let numbers = numbers_in("Totals: $1,250.50, then 2024.");
        assert!(numbers.contains("1250.50"));
        assert!(numbers.contains("2024"));
        assert_eq!(numbers.len(), 2);
    }
}
