use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RerankError {
    #[error("Reranking model unavailable: {0}")]
    Unavailable(String),
    #[error("RequestError: {0}")]
    RequestError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Reranker returned {actual} scores for {expected} passages")]
    CountMismatch { expected: usize, actual: usize },
}

/// A pairwise relevance model used as the second ranking stage.
///
/// Given a query and candidate passages, returns one relevance score per passage, in the same
/// order as `passages`. Higher means more relevant; scores only need to be comparable within
/// a single call.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn model_id(&self) -> &str;

    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError>;
}

/// Scores `passages` and checks that the reranker returned exactly one score per passage.
pub(crate) async fn score_checked(
    reranker: &dyn Reranker,
    query: &str,
    passages: &[&str],
) -> Result<Vec<f32>, RerankError> {
    let scores = reranker.score(query, passages).await?;
    if scores.len() != passages.len() {
        return Err(RerankError::CountMismatch {
            expected: passages.len(),
            actual: scores.len(),
        });
    }
    Ok(scores)
}
