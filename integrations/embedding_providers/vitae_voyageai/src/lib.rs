//! [Voyage AI](https://voyageai.com) embedding and reranking providers for vitae.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use vitae::embeddings::{EmbedderError, EmbeddingModel};
use vitae::rerank::{RerankError, Reranker};

const DEFAULT_API_KEY_VAR_NAME: &str = "VOYAGEAI_API_KEY";
const DEFAULT_EMBEDDINGS_URL: &str = "https://api.voyageai.com/v1/embeddings";
const DEFAULT_RERANK_URL: &str = "https://api.voyageai.com/v1/rerank";
const DEFAULT_RERANK_MODEL: &str = "rerank-2-lite";

#[derive(Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: String,
    dimensions: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct RerankConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
}

fn api_key(var: Option<String>) -> Result<String, String> {
    let var = var.unwrap_or_else(|| DEFAULT_API_KEY_VAR_NAME.to_string());
    std::env::var(&var).map_err(|_| format!("env var `{var}` is not set"))
}

fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "voyage-3-lite" => Some(512),
        "voyage-3" | "voyage-3-large" | "voyage-3.5" | "voyage-3.5-lite" | "voyage-code-3"
        | "voyage-finance-2" | "voyage-law-2" => Some(1024),
        "voyage-large-2" | "voyage-2" => Some(1536),
        _ => None,
    }
}

/// Implementation of vitae's `EmbeddingModel` trait for Voyage AI.
///
/// # Supported Configuration
///
/// The model accepts a JSON config with the following parameters:
///
/// - `model`: String identifier for the model to use
/// - `dimensions`(optional): output length, required for models not known to this crate
/// - `api_key_var`(optional): Environment variable name containing the API key
/// - `api_url`(optional): Custom API endpoint URL
///
/// # Examples
///
/// ```rust,no_run
/// use vitae_voyageai::VoyageAIEmbedding;
///
/// let model = VoyageAIEmbedding::new(r#"{
///     "model": "voyage-3-lite",
///     "api_key_var": "ENV_VAR"
/// }"#)?;
/// # Ok::<(), vitae::embeddings::EmbedderError>(())
/// ```
pub struct VoyageAIEmbedding {
    api_key: String,
    api_url: String,
    model: String,
    dimension: usize,
    client: Client,
}

impl VoyageAIEmbedding {
    /// Creates a new `VoyageAIEmbedding` from a JSON configuration string
    ///
    /// # Errors
    /// Returns [`EmbedderError::Unavailable`] if:
    ///  - The provided JSON is malformed or contains unknown fields
    ///  - The API key environment variable isn't set
    ///  - The model's output dimension is unknown and not configured
    pub fn new(json_config: &str) -> Result<Self, EmbedderError> {
        let config: ModelConfig = serde_json::from_str(json_config)
            .map_err(|e| EmbedderError::Unavailable(format!("invalid config: {e}")))?;
        let api_key = api_key(config.api_key_var).map_err(EmbedderError::Unavailable)?;
        let dimension = config
            .dimensions
            .or_else(|| known_dimension(&config.model))
            .ok_or_else(|| {
                EmbedderError::Unavailable(format!(
                    "unknown output dimension for model `{}`",
                    config.model
                ))
            })?;

        Ok(Self {
            api_key,
            api_url: config
                .api_url
                .unwrap_or_else(|| DEFAULT_EMBEDDINGS_URL.to_string()),
            model: config.model,
            dimension,
            client: Client::new(),
        })
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut request_body = json!({
                "input": input,
                "model": self.model,
        });
        if known_dimension(&self.model) != Some(self.dimension) {
            request_body["output_dimension"] = json!(self.dimension);
        }
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| EmbedderError::RequestError(e.to_string()))?;

        if response.status().is_success() {
            let mut response = response
                .json::<VoyageAIEmbeddingResponse>()
                .await
                .map_err(|e| EmbedderError::ParseError(e.to_string()))?;
            response.data.sort_by_key(|d| d.index);

            Ok(response.data.into_iter().map(|d| d.embedding).collect())
        } else {
            let error_message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(EmbedderError::ProviderError(error_message))
        }
    }
}

#[derive(Deserialize)]
struct VoyageAIEmbeddingResponse {
    pub data: Vec<VoyageAIEmbeddingData>,
}

#[derive(Deserialize)]
struct VoyageAIEmbeddingData {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
}

#[async_trait]
impl EmbeddingModel for VoyageAIEmbedding {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, data: &str) -> Result<Vec<f32>, EmbedderError> {
        self.request(json!(data))
            .await?
            .into_iter()
            .next()
            .ok_or(EmbedderError::CountMismatch {
                expected: 1,
                actual: 0,
            })
    }

    async fn embed_batch(&self, data: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.request(json!(data)).await?;
        debug!(inputs = data.len(), model = %self.model, "voyage batch embedded");
        if embeddings.len() != data.len() {
            return Err(EmbedderError::CountMismatch {
                expected: data.len(),
                actual: embeddings.len(),
            });
        }
        Ok(embeddings)
    }
}

/// Implementation of vitae's `Reranker` trait over the Voyage AI rerank endpoint.
///
/// # Supported Configuration
///
/// - `model`(optional): reranker model, `rerank-2-lite` by default
/// - `api_key_var`(optional): Environment variable name containing the API key
/// - `api_url`(optional): Custom API endpoint URL
///
/// Meant to be handed to the retriever builder as is, a missing key only disables reranking:
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use vitae::retriever::Retriever;
/// # use vitae::providers::embeddings::HashingEmbedding;
/// use vitae_voyageai::VoyageAIReranker;
///
/// let model = Arc::new(HashingEmbedding::default());
/// let retriever = Retriever::builder("data/vector_store.json", model)
///     .try_reranker(VoyageAIReranker::new(None))
///     .build()?;
/// # Ok::<(), vitae::retriever::RetrievalError>(())
/// ```
pub struct VoyageAIReranker {
    api_key: String,
    api_url: String,
    model: String,
    client: Client,
}

impl VoyageAIReranker {
    /// Creates a new `VoyageAIReranker` from an optional JSON configuration string
    ///
    /// # Errors
    /// Returns [`RerankError::Unavailable`] if the config is invalid or the API key isn't set.
    pub fn new(json_config: Option<&str>) -> Result<Self, RerankError> {
        let config: RerankConfig = match json_config {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| RerankError::Unavailable(format!("invalid config: {e}")))?,
            None => RerankConfig::default(),
        };
        let api_key = api_key(config.api_key_var).map_err(RerankError::Unavailable)?;
        Ok(Self {
            api_key,
            api_url: config.api_url.unwrap_or_else(|| DEFAULT_RERANK_URL.to_string()),
            model: config
                .model
                .unwrap_or_else(|| DEFAULT_RERANK_MODEL.to_string()),
            client: Client::new(),
        })
    }
}

#[derive(Deserialize)]
struct VoyageAIRerankResponse {
    pub data: Vec<VoyageAIRerankData>,
}

#[derive(Deserialize)]
struct VoyageAIRerankData {
    pub index: usize,
    pub relevance_score: f32,
}

/// Puts relevance scores back into passage order.
fn scores_in_passage_order(
    data: Vec<VoyageAIRerankData>,
    passages: usize,
) -> Result<Vec<f32>, RerankError> {
    let mut scores = vec![None; passages];
    for item in data {
        let slot = scores.get_mut(item.index).ok_or_else(|| {
            RerankError::ParseError(format!("score for unknown passage {}", item.index))
        })?;
        *slot = Some(item.relevance_score);
    }
    let returned = scores.iter().filter(|s| s.is_some()).count();
    scores
        .into_iter()
        .collect::<Option<Vec<f32>>>()
        .ok_or(RerankError::CountMismatch {
            expected: passages,
            actual: returned,
        })
}

#[async_trait]
impl Reranker for VoyageAIReranker {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        let request_body = json!({
            "query": query,
            "documents": passages,
            "model": self.model,
        });
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| RerankError::RequestError(e.to_string()))?;

        if response.status().is_success() {
            let response = response
                .json::<VoyageAIRerankResponse>()
                .await
                .map_err(|e| RerankError::ParseError(e.to_string()))?;
            scores_in_passage_order(response.data, passages.len())
        } else {
            let error_message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(RerankError::ProviderError(error_message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_requires_model() {
        let result = VoyageAIEmbedding::new("{}");
        assert!(matches!(result, Err(EmbedderError::Unavailable(_))));
    }

    #[test]
    fn test_missing_key_disables_reranker() {
        let result = VoyageAIReranker::new(Some(
            r#"{"api_key_var": "VITAE_TEST_VOYAGE_KEY_THAT_IS_NEVER_SET"}"#,
        ));
        assert!(matches!(result, Err(RerankError::Unavailable(_))));
    }

    #[test]
    fn test_scores_follow_passage_order() {
        let data = vec![
            VoyageAIRerankData {
                index: 2,
                relevance_score: 0.9,
            },
            VoyageAIRerankData {
                index: 0,
                relevance_score: 0.5,
            },
            VoyageAIRerankData {
                index: 1,
                relevance_score: 0.1,
            },
        ];
        assert_eq!(scores_in_passage_order(data, 3).unwrap(), vec![0.5, 0.1, 0.9]);
    }

    #[test]
    fn test_missing_scores_are_an_error() {
        let data = vec![VoyageAIRerankData {
            index: 0,
            relevance_score: 0.5,
        }];
        assert_eq!(
            scores_in_passage_order(data, 2),
            Err(RerankError::CountMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[tokio::test]
    #[ignore]
    async fn simple_voyage_embed_request() {
        let model = VoyageAIEmbedding::new(r#"{"model": "voyage-3-lite"}"#).unwrap();
        let response = model.embed("test").await;
        assert!(response.is_ok_and(|v| v.len() == 512));
    }

    #[tokio::test]
    #[ignore]
    async fn simple_voyage_rerank_request() {
        let reranker = VoyageAIReranker::new(None).unwrap();
        let scores = reranker
            .score("Python", &["Built Python microservices on AWS", "Led team using Agile"])
            .await
            .unwrap();
        assert!(scores[0] > scores[1]);
    }
}
