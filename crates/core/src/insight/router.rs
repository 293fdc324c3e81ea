use serde::{Deserialize, Serialize};

use crate::domain::BoardCategory;
use crate::rules::Lexicon;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Pipeline,
    Execution,
    Overall,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline",
            Self::Execution => "execution",
            Self::Overall => "overall",
            Self::Unknown => "unknown",
        }
    }

    pub fn required_boards(&self) -> Vec<BoardCategory> {
        match self {
            Self::Pipeline => vec![BoardCategory::Deal],
            Self::Execution => vec![BoardCategory::WorkOrder],
            Self::Overall => BoardCategory::ALL.to_vec(),
            Self::Unknown => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub intent: Intent,
    pub required_boards: Vec<BoardCategory>,
    pub matched_terms: Vec<String>,
    pub wants_details: bool,
}

/// Keyword classifier over the rule-table lexicon.
#[derive(Clone, Debug)]
pub struct QuestionRouter {
    pipeline: Vec<Term>,
    execution: Vec<Term>,
    overall: Vec<Term>,
    details: Vec<Term>,
}

#[derive(Clone, Debug)]
struct Term {
    phrase: String,
    tokens: Vec<String>,
}

impl Term {
    fn new(phrase: &str) -> Option<Self> {
        let tokens = tokenize(phrase);
        (!tokens.is_empty()).then(|| Self { phrase: tokens.join(" "), tokens })
    }

    /// Whole-token match; a trailing `s` on the question token is tolerated.
    fn matches(&self, question: &[String]) -> bool {
        question.windows(self.tokens.len()).any(|window| {
            window.iter().zip(&self.tokens).all(|(word, term)| {
                word == term || word.strip_suffix('s').is_some_and(|stem| stem == term)
            })
        })
    }
}

fn compile(phrases: &[String]) -> Vec<Term> {
    phrases.iter().filter_map(|phrase| Term::new(phrase)).collect()
}

fn hits(terms: &[Term], tokens: &[String]) -> Vec<String> {
    terms.iter().filter(|term| term.matches(tokens)).map(|term| term.phrase.clone()).collect()
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.to_lowercase().chars() {
        if character.is_alphanumeric() {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

impl QuestionRouter {
    pub fn new(lexicon: &Lexicon) -> Self {
        Self {
            pipeline: compile(&lexicon.pipeline),
            execution: compile(&lexicon.execution),
            overall: compile(&lexicon.overall),
            details: compile(&lexicon.details),
        }
    }

    pub fn classify(&self, text: &str) -> Question {
        let tokens = tokenize(text);
        let pipeline = hits(&self.pipeline, &tokens);
        let execution = hits(&self.execution, &tokens);
        let overall = hits(&self.overall, &tokens);

        let intent = match (pipeline.is_empty(), execution.is_empty(), overall.is_empty()) {
            (true, true, true) => Intent::Unknown,
            (false, true, true) => Intent::Pipeline,
            (true, false, true) => Intent::Execution,
            // Mixed or explicitly broad questions take the wider scope.
            _ => Intent::Overall,
        };

        let mut matched_terms: Vec<String> =
            pipeline.into_iter().chain(execution).chain(overall).collect();
        matched_terms.sort();
        matched_terms.dedup();

        Question {
            text: text.trim().to_string(),
            intent,
            required_boards: intent.required_boards(),
            matched_terms,
            wants_details: !hits(&self.details, &tokens).is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Intent, QuestionRouter};
    use crate::domain::BoardCategory;
    use crate::rules::Lexicon;

    fn router() -> QuestionRouter {
        QuestionRouter::new(&Lexicon::default())
    }

    #[test]
    fn win_rate_question_is_pipeline() {
        let question = router().classify("What is our win rate?");
        assert_eq!(question.intent, Intent::Pipeline);
        assert_eq!(question.required_boards, vec![BoardCategory::Deal]);
        assert!(question.matched_terms.contains(&"win rate".to_string()));
    }

    #[test]
    fn everything_question_is_overall_and_needs_both_boards() {
        let question = router().classify("How is everything going?");
        assert_eq!(question.intent, Intent::Overall);
        assert_eq!(question.required_boards, vec![BoardCategory::Deal, BoardCategory::WorkOrder]);
    }

    #[test]
    fn plural_forms_match() {
        let question = router().classify("Which projects have bottlenecks?");
        assert_eq!(question.intent, Intent::Execution);
        assert!(question.wants_details);
    }

    #[test]
    fn terms_from_both_boards_resolve_to_overall() {
        let question = router().classify("Are deals turning into delayed work orders?");
        assert_eq!(question.intent, Intent::Overall);
        assert_eq!(question.required_boards.len(), 2);
    }

    #[test]
    fn substrings_do_not_count_as_terms() {
        // "dealer" must not match "deal", "taskforce" must not match "task".
        let question = router().classify("Who is the dealer for the taskforce?");
        assert_eq!(question.intent, Intent::Unknown);
        assert!(question.required_boards.is_empty());
    }

    #[test]
    fn unmatched_question_is_unknown() {
        let question = router().classify("What's the weather in Lisbon?");
        assert_eq!(question.intent, Intent::Unknown);
        assert!(question.matched_terms.is_empty());
    }

    #[test]
    fn detail_terms_are_detected() {
        assert!(router().classify("List all deals in negotiation").wants_details);
        assert!(!router().classify("What is our pipeline forecast?").wants_details);
    }
}
