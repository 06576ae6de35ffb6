use crate::error::ProviderError;
use crate::traits::EmbeddingProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Embedding client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": text,
                "dimensions": self.dimension,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Backend {
                provider: "openai-embeddings".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let vector: Vec<f32> = parsed
            .pointer("/data/0/embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::Contract {
                provider: "openai-embeddings".to_string(),
                details: "response missing data[0].embedding".to_string(),
            })?
            .iter()
            .filter_map(Value::as_f64)
            .map(|value| value as f32)
            .collect();

        if vector.len() != self.dimension {
            return Err(ProviderError::Contract {
                provider: "openai-embeddings".to_string(),
                details: format!(
                    "embedding has {} dimensions, expected {}",
                    vector.len(),
                    self.dimension
                ),
            });
        }

        Ok(vector)
    }
}
