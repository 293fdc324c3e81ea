use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use boardsight_core::config::{LlmConfig, LlmProvider};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 400;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Chat-completion client for the configured provider. `base_url` lets the
/// OpenAI wire format point at compatible hosts such as Groq.
#[derive(Clone)]
pub struct HttpLlmClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let base_url = match (&config.base_url, config.provider) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, LlmProvider::OpenAi) => OPENAI_BASE_URL.to_string(),
            (None, LlmProvider::Anthropic) => ANTHROPIC_BASE_URL.to_string(),
            (None, LlmProvider::Ollama) => bail!("ollama provider requires llm.base_url"),
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building llm http client")?;

        Ok(Self {
            client,
            provider: config.provider,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| anyhow!("{} provider requires an api key", self.provider.as_str()))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = match self.provider {
            LlmProvider::OpenAi => self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(self.key()?)
                .json(&json!({
                    "model": self.model,
                    "temperature": 0.2,
                    "max_tokens": MAX_OUTPUT_TOKENS,
                    "messages": [{"role": "user", "content": prompt}],
                })),
            LlmProvider::Anthropic => self
                .client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", self.key()?)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": MAX_OUTPUT_TOKENS,
                    "messages": [{"role": "user", "content": prompt}],
                })),
            LlmProvider::Ollama => self
                .client
                .post(format!("{}/api/generate", self.base_url))
                .json(&json!({ "model": self.model, "prompt": prompt, "stream": false })),
        };

        let response = request.send().await.context("llm request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("llm endpoint returned {status}");
        }
        let body: Value = response.json().await.context("llm response was not json")?;
        extract_text(self.provider, &body)
    }
}

fn extract_text(provider: LlmProvider, body: &Value) -> Result<String> {
    let text = match provider {
        LlmProvider::OpenAi => body.pointer("/choices/0/message/content"),
        LlmProvider::Anthropic => body.pointer("/content/0/text"),
        LlmProvider::Ollama => body.get("response"),
    }
    .and_then(Value::as_str)
    .ok_or_else(|| anyhow!("{} response carried no text", provider.as_str()))?;
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use boardsight_core::config::{AppConfig, LlmProvider};
    use serde_json::json;

    use super::{extract_text, HttpLlmClient};

    #[test]
    fn extracts_text_for_each_provider() {
        let openai = json!({"choices": [{"message": {"role": "assistant", "content": " Pipeline is healthy. "}}]});
        let anthropic = json!({"content": [{"type": "text", "text": "Pipeline is healthy."}]});
        let ollama = json!({"response": "Pipeline is healthy.", "done": true});

        for (provider, body) in [
            (LlmProvider::OpenAi, openai),
            (LlmProvider::Anthropic, anthropic),
            (LlmProvider::Ollama, ollama),
        ] {
            assert_eq!(extract_text(provider, &body).expect("text"), "Pipeline is healthy.");
        }
    }

    #[test]
    fn missing_text_is_an_error() {
        let error = extract_text(LlmProvider::OpenAi, &json!({"choices": []})).expect_err("no text");
        assert!(error.to_string().contains("openai"));
    }

    #[test]
    fn ollama_needs_a_base_url() {
        let mut config = AppConfig::default().llm;
        config.base_url = None;
        assert!(HttpLlmClient::from_config(&config).is_err());

        config.provider = LlmProvider::OpenAi;
        assert!(HttpLlmClient::from_config(&config).is_ok());
    }
}
