use async_trait::async_trait;

use super::{normalize, EmbedderError};

/// A text embedding function.
///
/// Implementations are constructed once per process and shared (behind an `Arc`)
/// by the indexer and any number of retrievers.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Identifier recorded in the vector store, eg `text-embedding-3-small`.
    fn model_id(&self) -> &str;

    /// Length of every vector this model produces.
    fn dimension(&self) -> usize;

    async fn embed(&self, data: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embeds several inputs, in order. Providers with a batch endpoint should override this.
    async fn embed_batch(&self, data: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut embeddings = Vec::with_capacity(data.len());
        for text in data {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Embeds `data` and returns the L2 normalized vector, checking its length against the model's.
pub async fn embed_normalized(
    model: &dyn EmbeddingModel,
    data: &str,
) -> Result<Vec<f32>, EmbedderError> {
    let mut vector = model.embed(data).await?;
    check_dimension(model, vector.len())?;
    normalize(&mut vector);
    Ok(vector)
}

pub(crate) fn check_dimension(
    model: &dyn EmbeddingModel,
    actual: usize,
) -> Result<(), EmbedderError> {
    if actual != model.dimension() {
        return Err(EmbedderError::DimensionMismatch {
            model: model.model_id().to_string(),
            expected: model.dimension(),
            actual,
        });
    }
    Ok(())
}
