use crate::error::ProviderError;
use crate::traits::ReRankProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Cross-encoder re-ranking client for Cohere-style `/v2/rerank` endpoints.
#[derive(Clone)]
pub struct CohereReRanker {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl CohereReRanker {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ReRankProvider for CohereReRanker {
    async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v2/rerank", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "query": query,
                "documents": passages,
                "top_n": passages.len(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Backend {
                provider: "cohere-rerank".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let results = parsed
            .pointer("/results")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::Contract {
                provider: "cohere-rerank".to_string(),
                details: "response missing results array".to_string(),
            })?;

        // The backend returns (index, score) pairs ordered by score; callers
        // need scores aligned with the input passages.
        let mut scores = vec![None; passages.len()];
        for result in results {
            let index = result
                .pointer("/index")
                .and_then(Value::as_u64)
                .map(|index| index as usize);
            let score = result
                .pointer("/relevance_score")
                .and_then(Value::as_f64)
                .map(|score| score as f32);

            match (index, score) {
                (Some(index), Some(score)) if index < scores.len() => scores[index] = Some(score),
                _ => {
                    return Err(ProviderError::Contract {
                        provider: "cohere-rerank".to_string(),
                        details: format!("malformed rerank result: {result}"),
                    })
                }
            }
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(position, score)| {
                score.ok_or_else(|| ProviderError::Contract {
                    provider: "cohere-rerank".to_string(),
                    details: format!("no score returned for passage {position}"),
                })
            })
            .collect()
    }
}
