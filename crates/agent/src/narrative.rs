use async_trait::async_trait;
use boardsight_core::insight::Response;
use thiserror::Error;
use tracing::debug;

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::LlmClient;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NarrativeError {
    #[error("narrative generation unavailable: {0}")]
    Unavailable(String),
    #[error("narrative generation timed out")]
    Timeout,
    #[error("narrative rejected by guardrail `{reason_code}`: {detail}")]
    Rejected { reason_code: &'static str, detail: String },
}

/// Best-effort rephrasing of a composed response's executive summary.
/// Callers must behave correctly when every call fails.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate_summary(&self, response: &Response) -> Result<String, NarrativeError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNarrator;

#[async_trait]
impl NarrativeGenerator for NoopNarrator {
    async fn generate_summary(&self, _response: &Response) -> Result<String, NarrativeError> {
        Err(NarrativeError::Unavailable("no narrative generator configured".to_string()))
    }
}

pub struct LlmNarrator<C> {
    client: C,
    guardrails: GuardrailPolicy,
}

impl<C: LlmClient> LlmNarrator<C> {
    pub fn new(client: C) -> Self {
        Self { client, guardrails: GuardrailPolicy::default() }
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailPolicy) -> Self {
        self.guardrails = guardrails;
        self
    }
}

#[async_trait]
impl<C: LlmClient> NarrativeGenerator for LlmNarrator<C> {
    async fn generate_summary(&self, response: &Response) -> Result<String, NarrativeError> {
        let prompt = build_prompt(response);
        let candidate = self
            .client
            .complete(&prompt)
            .await
            .map_err(|error| NarrativeError::Unavailable(error.to_string()))?;

        match self.guardrails.evaluate(&response.executive_summary, &candidate) {
            GuardrailDecision::Allow => Ok(candidate.trim().to_string()),
            GuardrailDecision::Deny { reason_code, detail, fallback_path } => {
                debug!(
                    event_name = "narrative.guardrail.denied",
                    reason_code,
                    fallback_path,
                    "model summary rejected"
                );
                Err(NarrativeError::Rejected { reason_code, detail })
            }
        }
    }
}

fn build_prompt(response: &Response) -> String {
    let metrics = serde_json::to_string(&response.metrics).unwrap_or_default();
    let mut prompt = String::new();
    prompt.push_str(
        "You are a business analyst writing for executives. Rewrite the summary below as two or three \
         plain sentences. Use only numbers that appear in the summary, copied exactly. Do not add \
         figures, estimates or percentages of your own.\n\n",
    );
    prompt.push_str(&format!("Question: {}\n", response.question));
    prompt.push_str(&format!("Summary: {}\n", response.executive_summary));
    if !response.insights.is_empty() {
        prompt.push_str(&format!("Context: {}\n", response.insights.join(" ")));
    }
    if !response.caveats.is_empty() {
        prompt.push_str(&format!("Caveats: {}\n", response.caveats.join(" ")));
    }
    prompt.push_str(&format!("Metrics (reference only): {metrics}\n"));
    prompt
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;
    use boardsight_core::insight::{Intent, Response, SummarySource};

    use super::{LlmNarrator, NarrativeError, NarrativeGenerator, NoopNarrator};
    use crate::llm::LlmClient;

    struct ScriptedLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(reply: &str) -> Self {
            Self { reply: reply.to_string(), prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().expect("prompt lock").push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    fn response() -> Response {
        Response {
            question: "What is our win rate?".to_string(),
            intent: Intent::Pipeline,
            executive_summary: "Pipeline: 6 deals, win rate 50.0%.".to_string(),
            summary_source: SummarySource::Template,
            data_used: Vec::new(),
            metrics: BTreeMap::new(),
            insights: Vec::new(),
            caveats: Vec::new(),
            recommendations: Vec::new(),
            details: Vec::new(),
        }
    }

    #[tokio::test]
    async fn noop_narrator_is_always_unavailable() {
        let result = NoopNarrator.generate_summary(&response()).await;
        assert!(matches!(result, Err(NarrativeError::Unavailable(_))));
    }

    #[tokio::test]
    async fn llm_rephrasing_passes_when_numbers_match() {
        let narrator = LlmNarrator::new(ScriptedLlm::new("Half of the 6 closed deals were won (50.0%)."));
        let summary = narrator.generate_summary(&response()).await.expect("summary");

        assert_eq!(summary, "Half of the 6 closed deals were won (50.0%).");
        let prompts = narrator.client.prompts.lock().expect("prompt lock");
        assert!(prompts[0].contains("Summary: Pipeline: 6 deals, win rate 50.0%."));
    }

    #[tokio::test]
    async fn invented_numbers_are_rejected() {
        let narrator = LlmNarrator::new(ScriptedLlm::new("Win rate is 50.0%, up 12 points."));
        let result = narrator.generate_summary(&response()).await;

        assert!(matches!(
            result,
            Err(NarrativeError::Rejected { reason_code: "unsupported_numeric_claim", .. })
        ));
    }

    #[tokio::test]
    async fn client_failure_maps_to_unavailable() {
        let result = LlmNarrator::new(FailingLlm).generate_summary(&response()).await;
        assert!(matches!(result, Err(NarrativeError::Unavailable(message)) if message.contains("refused")));
    }
}
