use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::embeddings::{model::EmbeddingModel, EmbedderError};

const DEFAULT_API_KEY_VAR_NAME: &str = "OPENAI_API_KEY";
const DEFAULT_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
}

/// Embedding model backed by the OpenAI embeddings endpoint.
///
/// # Supported Configuration
///
/// - `model`(optional): model identifier, `text-embedding-3-small` by default
/// - `dimensions`(optional): output length, required for models not known to this crate
/// - `api_key_var`(optional): environment variable holding the API key, `OPENAI_API_KEY` by default
/// - `api_url`(optional): custom endpoint URL
///
/// ```rust,no_run
/// use vitae::providers::embeddings::OpenAIEmbedding;
///
/// let model = OpenAIEmbedding::new(Some(r#"{"model": "text-embedding-3-large"}"#))?;
/// # Ok::<(), vitae::embeddings::EmbedderError>(())
/// ```
pub struct OpenAIEmbeddingModel {
    api_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    client: Client,
}

impl OpenAIEmbeddingModel {
    /// Creates the model from an optional JSON config.
    ///
    /// # Errors
    /// Returns [`EmbedderError::Unavailable`] if the config can't be parsed, the API key variable
    /// isn't set or the output dimension of the model is unknown.
    pub fn new(json_config: Option<&str>) -> Result<Self, EmbedderError> {
        let config: ModelConfig = match json_config {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| EmbedderError::Unavailable(format!("invalid config: {e}")))?,
            None => ModelConfig::default(),
        };
        let api_key_var = config
            .api_key_var
            .unwrap_or_else(|| DEFAULT_API_KEY_VAR_NAME.to_string());
        let api_key = std::env::var(&api_key_var).map_err(|_| {
            EmbedderError::Unavailable(format!("env var `{api_key_var}` is not set"))
        })?;
        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let dimension = config
            .dimensions
            .or_else(|| known_dimension(&model))
            .ok_or_else(|| {
                EmbedderError::Unavailable(format!("unknown output dimension for model `{model}`"))
            })?;

        Ok(Self {
            api_url: config.api_url.unwrap_or_else(|| DEFAULT_URL.to_string()),
            api_key,
            model,
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
            request_body["dimensions"] = json!(self.dimension);
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
                .json::<OpenAIEmbeddingResponse>()
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

fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    pub data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbeddingModel {
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
        if embeddings.len() != data.len() {
            return Err(EmbedderError::CountMismatch {
                expected: data.len(),
                actual: embeddings.len(),
            });
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_needs_dimensions() {
        std::env::set_var("VITAE_TEST_OPENAI_DUMMY_KEY", "sk-test");
        let result = OpenAIEmbeddingModel::new(Some(
            r#"{"model": "my-custom-model", "api_key_var": "VITAE_TEST_OPENAI_DUMMY_KEY"}"#,
        ));
        assert!(matches!(result, Err(EmbedderError::Unavailable(_))));

        let model = OpenAIEmbeddingModel::new(Some(
            r#"{
                "model": "my-custom-model",
                "dimensions": 256,
                "api_key_var": "VITAE_TEST_OPENAI_DUMMY_KEY"
            }"#,
        ))
        .unwrap();
        assert_eq!(model.dimension(), 256);
    }

    #[test]
    fn test_missing_api_key_is_unavailable() {
        let result = OpenAIEmbeddingModel::new(Some(
            r#"{"api_key_var": "VITAE_TEST_OPENAI_KEY_THAT_IS_NEVER_SET"}"#,
        ));
        assert!(matches!(result, Err(EmbedderError::Unavailable(_))));
    }

    #[test]
    fn test_unknown_config_fields_are_rejected() {
        let result = OpenAIEmbeddingModel::new(Some(r#"{"modle": "typo"}"#));
        assert!(matches!(result, Err(EmbedderError::Unavailable(_))));
    }

    #[tokio::test]
    #[ignore]
    async fn simple_openai_embed_request() {
        let model = OpenAIEmbeddingModel::new(None).unwrap();
        let response = model.embed("test").await;
        assert!(response.is_ok_and(|v| v.len() == 1536));
    }
}
