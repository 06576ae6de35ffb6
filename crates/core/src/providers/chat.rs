use crate::error::ProviderError;
use crate::models::Judgment;
use crate::traits::{ChatProvider, JudgeProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const JUDGE_SYSTEM_PROMPT: &str = "\
You grade answers against an expected answer. Respond with a single JSON \
object, no prose and no code fences: \
{\"is_correct\": true|false, \"reasoning\": \"one short sentence\"}. \
Judge semantic equivalence, not exact wording.";

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct ChatClient {
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    seed: Option<u64>,
    client: Client,
}

impl ChatClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.5,
            seed: Some(123),
            client: Client::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

#[async_trait]
impl ChatProvider for ChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        if let Some(seed) = self.seed {
            body["seed"] = json!(seed);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Backend {
                provider: "chat".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Contract {
                provider: "chat".to_string(),
                details: "response missing choices[0].message.content".to_string(),
            })
    }
}

/// Judges answers by prompting a chat backend for a strict JSON verdict.
pub struct ChatJudge<C> {
    chat: C,
}

impl<C: ChatProvider> ChatJudge<C> {
    pub fn new(chat: C) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl<C: ChatProvider> JudgeProvider for ChatJudge<C> {
    async fn judge(
        &self,
        question: &str,
        answer: &str,
        expected_answer: &str,
    ) -> Result<Judgment, ProviderError> {
        let user_message = format!(
            "<question>\n{question}\n</question>\n\
             <produced_answer>\n{answer}\n</produced_answer>\n\
             <expected_answer>\n{expected_answer}\n</expected_answer>"
        );

        let raw = self.chat.complete(JUDGE_SYSTEM_PROMPT, &user_message).await?;
        parse_verdict(&raw)
    }
}

/// Models drift toward fenced output no matter what the prompt says, so
/// strip fences before parsing.
fn parse_verdict(raw: &str) -> Result<Judgment, ProviderError> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

    serde_json::from_str(trimmed).map_err(|error| ProviderError::Contract {
        provider: "chat-judge".to_string(),
        details: format!("unparseable verdict ({error}): {raw}"),
    })
}
