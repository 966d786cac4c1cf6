use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::embeddings::{model::EmbeddingModel, EmbedderError};

pub const DEFAULT_DIMENSION: usize = 384;

/// A local, deterministic embedding model based on signed feature hashing.
///
/// Each lowercased word token is hashed with SHA-256 into one of `dimension` buckets with a
/// pseudo-random sign, so texts sharing vocabulary land close together. It carries no
/// semantics beyond shared terms, but needs no network or model files, and produces
/// identical vectors across processes and platforms.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingModel {
    model_id: String,
    dimension: usize,
}

impl HashingEmbeddingModel {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            model_id: format!("hashing-{dimension}"),
            dimension,
        }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        #[allow(clippy::cast_possible_truncation)]
        let bucket = (u64::from_le_bytes(head) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl Default for HashingEmbeddingModel {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

/// Splits text into lowercased word tokens. `+` and `#` stay part of a token so `C++` and `C#`
/// don't collapse into `c`.
pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingModel for HashingEmbeddingModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, data: &str) -> Result<Vec<f32>, EmbedderError> {
        if self.dimension == 0 {
            return Err(EmbedderError::Unavailable(
                "hashing model configured with zero dimensions".to_string(),
            ));
        }
        let mut vector = vec![0.0; self.dimension];
        for token in tokenize(data) {
            let (bucket, sign) = self.bucket(&token);
            vector[bucket] += sign;
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{dot, model::embed_normalized};

    #[test]
    fn test_tokenize() {
        let tokens: Vec<String> = tokenize("Built C++ & C# services, on AWS!").collect();
        assert_eq!(tokens, vec!["built", "c++", "c#", "services", "on", "aws"]);
    }

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let model = HashingEmbeddingModel::default();
        let a = model.embed("Built Python microservices").await.unwrap();
        let b = HashingEmbeddingModel::default()
            .embed("Built Python microservices")
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSION);
    }

    #[tokio::test]
    async fn test_case_insensitive_terms_match() {
        let model = HashingEmbeddingModel::default();
        let a = embed_normalized(&model, "PYTHON").await.unwrap();
        let b = embed_normalized(&model, "python").await.unwrap();
        assert!((dot(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_shared_terms_score_higher() {
        let model = HashingEmbeddingModel::default();
        let query = embed_normalized(&model, "Python").await.unwrap();
        let related = embed_normalized(&model, "Built Python microservices on AWS")
            .await
            .unwrap();
        let unrelated = embed_normalized(&model, "Led team using Agile").await.unwrap();
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_zero_dimension_is_unavailable() {
        let model = HashingEmbeddingModel::new(0);
        assert!(matches!(
            model.embed("anything").await,
            Err(EmbedderError::Unavailable(_))
        ));
    }
}
