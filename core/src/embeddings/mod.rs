pub mod model;

use thiserror::Error;

pub use model::EmbeddingModel;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbedderError {
    #[error("Embedding model unavailable: {0}")]
    Unavailable(String),
    #[error("RequestError: {0}")]
    RequestError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Embedding has {actual} dimensions, model {model} produces {expected}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },
    #[error("Provider returned {actual} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
}

/// Scales `vector` to unit length in place.
///
/// Zero vectors are left untouched, they have no direction to preserve.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}

/// Inner product of two vectors, equal to cosine similarity when both are normalized.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
