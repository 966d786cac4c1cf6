use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::document::Document;
use crate::embeddings::model::embed_normalized;
use crate::embeddings::{EmbedderError, EmbeddingModel};
use crate::index::{FlatIndex, IndexError, VectorIndex};
use crate::rerank::{score_checked, RerankError, Reranker};
use crate::vector_store::{StoreMetadata, VectorStore, VectorStoreError};

/// Lower bound on the number of candidates pulled from the index for a query, so threshold
/// filtering and reranking still have something to work with when `top_k` is small.
pub const MIN_CANDIDATES: usize = 20;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Embedding dimension mismatch: store expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Index has {index_rows} rows but the store holds {documents} documents")]
    RowCountMismatch { index_rows: usize, documents: usize },
    #[error("Index belongs to build {index}, the store to build {store}")]
    BuildMismatch { store: Uuid, index: Uuid },
    #[error("Store was built with `{found}`, config expects `{expected}`")]
    ModelMismatch { expected: String, found: String },
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedderError),
    #[error(transparent)]
    Index(IndexError),
    #[error(transparent)]
    Store(VectorStoreError),
}

impl From<IndexError> for RetrievalError {
    fn from(value: IndexError) -> Self {
        match value {
            IndexError::NotFound { path } => Self::NotFound { path },
            IndexError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            other => Self::Index(other),
        }
    }
}

impl From<VectorStoreError> for RetrievalError {
    fn from(value: VectorStoreError) -> Self {
        match value {
            VectorStoreError::NotFound { path } => Self::NotFound { path },
            other => Self::Store(other),
        }
    }
}

/// Ranked evidence for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    /// Best match first.
    pub documents: Vec<Document>,
    /// `scores[i]` belongs to `documents[i]`, reranker scores when `reranked` is set.
    pub scores: Vec<f32>,
    /// Candidates that matched before truncation to `top_k`.
    pub total_matched: usize,
    pub reranked: bool,
}

impl RetrievalResult {
    pub fn iter(&self) -> impl Iterator<Item = (&Document, f32)> {
        self.documents.iter().zip(self.scores.iter().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Builder for a [`Retriever`] over a persisted store.
pub struct RetrieverBuilder {
    store_path: PathBuf,
    embedding_model: Arc<dyn EmbeddingModel>,
    reranker: Option<Arc<dyn Reranker>>,
    top_k: Option<usize>,
    similarity_threshold: Option<f32>,
    expected_model: Option<String>,
}

impl RetrieverBuilder {
    /// Enables reranking with `reranker`.
    #[must_use]
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Enables reranking if the reranker could be constructed.
    ///
    /// A reranker that failed to load isn't fatal, the retriever is built without one and
    /// ranks by similarity alone.
    #[must_use]
    pub fn try_reranker<R: Reranker + 'static>(mut self, reranker: Result<R, RerankError>) -> Self {
        match reranker {
            Ok(reranker) => self.reranker = Some(Arc::new(reranker)),
            Err(e) => {
                warn!("Reranker unavailable, falling back to similarity ranking: {e}");
                self.reranker = None;
            }
        }
        self
    }

    /// Default number of results, overriding the value recorded in the store.
    #[must_use]
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Default minimum score, overriding the value recorded in the store.
    #[must_use]
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Takes the default `top_k` and threshold from `config`. If the config names an
    /// embedding model, [`RetrieverBuilder::build`] also requires the store to be built with it.
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        self.expected_model.clone_from(&config.embedding_model);
        self.top_k(config.retrieval_top_k)
            .similarity_threshold(config.similarity_threshold)
    }

    /// Loads the store and its index and checks them against each other and the live model.
    ///
    /// # Errors
    /// - [`RetrievalError::NotFound`] if the store or index file is missing
    /// - [`RetrievalError::DimensionMismatch`] if the store, index and model disagree on dimension
    /// - [`RetrievalError::RowCountMismatch`] if the index doesn't have one row per document
    /// - [`RetrievalError::BuildMismatch`] if the index wasn't written by the store's build
    /// - [`RetrievalError::ModelMismatch`] if the config names a model the store wasn't built with
    pub fn build(self) -> Result<Retriever, RetrievalError> {
        let store = VectorStore::load(&self.store_path)?;
        if let Some(expected) = self.expected_model {
            if expected != store.metadata.embedding_model {
                return Err(RetrievalError::ModelMismatch {
                    expected,
                    found: store.metadata.embedding_model.clone(),
                });
            }
        }
        let index_path = store.resolve_index_path(&self.store_path);
        let index = FlatIndex::read(&index_path)?;

        let mut retriever = Retriever::from_parts(store, Box::new(index), self.embedding_model)?;
        retriever.reranker = self.reranker;
        if let Some(top_k) = self.top_k {
            retriever.top_k = top_k;
        }
        if let Some(threshold) = self.similarity_threshold {
            retriever.similarity_threshold = threshold;
        }

        info!(
            store = %self.store_path.display(),
            index = %index_path.display(),
            documents = retriever.document_count(),
            reranking = retriever.reranking_enabled(),
            "retriever ready"
        );
        Ok(retriever)
    }
}

/// Answers similarity queries against a loaded vector store.
///
/// Loading the store, index and models is the expensive part, so a retriever is meant to be
/// built once and shared (it is `Send + Sync`, queries only take `&self`).
pub struct Retriever {
    store: VectorStore,
    index: Box<dyn VectorIndex>,
    embedding_model: Arc<dyn EmbeddingModel>,
    reranker: Option<Arc<dyn Reranker>>,
    top_k: usize,
    similarity_threshold: f32,
}

impl Retriever {
    pub fn builder(
        store_path: impl AsRef<Path>,
        embedding_model: Arc<dyn EmbeddingModel>,
    ) -> RetrieverBuilder {
        RetrieverBuilder {
            store_path: store_path.as_ref().to_path_buf(),
            embedding_model,
            reranker: None,
            top_k: None,
            similarity_threshold: None,
            expected_model: None,
        }
    }

    /// Builds a retriever from an already loaded store and any index backend.
    ///
    /// `index` must have been built from `store.documents`, in order. An index that records a
    /// build id must carry the store's.
    pub fn from_parts(
        store: VectorStore,
        index: Box<dyn VectorIndex>,
        embedding_model: Arc<dyn EmbeddingModel>,
    ) -> Result<Self, RetrievalError> {
        let expected = store.metadata.embedding_dimension;
        if embedding_model.dimension() != expected {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                actual: embedding_model.dimension(),
            });
        }
        if index.dimension() != expected {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                actual: index.dimension(),
            });
        }
        if let Some(index_build) = index.build_id() {
            if index_build != store.metadata.build_id {
                return Err(RetrievalError::BuildMismatch {
                    store: store.metadata.build_id,
                    index: index_build,
                });
            }
        }
        if index.len() != store.documents.len() {
            return Err(RetrievalError::RowCountMismatch {
                index_rows: index.len(),
                documents: store.documents.len(),
            });
        }
        if embedding_model.model_id() != store.metadata.embedding_model {
            warn!(
                store_model = %store.metadata.embedding_model,
                live_model = %embedding_model.model_id(),
                "store was built with a different embedding model"
            );
        }

        Ok(Self {
            top_k: store.metadata.retrieval_top_k,
            similarity_threshold: store.metadata.similarity_threshold,
            store,
            index,
            embedding_model,
            reranker: None,
        })
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.store.documents.len()
    }

    #[must_use]
    pub fn metadata(&self) -> &StoreMetadata {
        &self.store.metadata
    }

    #[must_use]
    pub fn reranking_enabled(&self) -> bool {
        self.reranker.is_some()
    }

    /// Returns the documents most similar to `query`.
    ///
    /// `top_k` and `similarity_threshold` fall back to the retriever defaults. The index is
    /// asked for `max(2 * top_k, 20)` candidates, those scoring below the threshold are
    /// dropped, and the rest are ordered by similarity, or by reranker score when a reranker
    /// is set, before truncating to `top_k`.
    ///
    /// # Errors
    /// Fails if the query can't be embedded. A failing reranker only degrades the ranking.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        similarity_threshold: Option<f32>,
    ) -> Result<RetrievalResult, RetrievalError> {
        let top_k = top_k.unwrap_or(self.top_k);
        let threshold = similarity_threshold.unwrap_or(self.similarity_threshold);
        if self.store.documents.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let query_vector = embed_normalized(self.embedding_model.as_ref(), query).await?;
        let fetch = top_k.saturating_mul(2).max(MIN_CANDIDATES);
        let mut candidates: Vec<(usize, f32)> = self
            .index
            .search(&query_vector, fetch)?
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        let total_matched = candidates.len();

        let mut reranked = false;
        if let Some(reranker) = &self.reranker {
            if !candidates.is_empty() {
                match self.rerank(reranker.as_ref(), query, &candidates).await {
                    Ok(rescored) => {
                        candidates = rescored;
                        reranked = true;
                    }
                    Err(e) => warn!("Reranking failed, using similarity order: {e}"),
                }
            }
        }
        candidates.truncate(top_k);

        debug!(
            fetched = fetch,
            total_matched,
            returned = candidates.len(),
            reranked,
            "retrieved"
        );
        Ok(self.collect(candidates, total_matched, reranked))
    }

    /// Evidence for a single job requirement.
    pub async fn retrieve_by_requirement(
        &self,
        requirement: &str,
    ) -> Result<RetrievalResult, RetrievalError> {
        self.retrieve(requirement, None, None).await
    }

    /// Evidence for a single skill.
    pub async fn retrieve_by_skill(&self, skill: &str) -> Result<RetrievalResult, RetrievalError> {
        self.retrieve(skill, None, None).await
    }

    /// Documents whose `employer` equals `employer`, ignoring case.
    ///
    /// Matches are ranked by similarity to `query`, or to the employer name when no query is
    /// given. No threshold applies, `total_matched` counts every metadata match and `top_k`
    /// of `None` returns all of them.
    pub async fn retrieve_by_employer(
        &self,
        employer: &str,
        query: Option<&str>,
        top_k: Option<usize>,
    ) -> Result<RetrievalResult, RetrievalError> {
        let wanted = employer.to_lowercase();
        let matching: HashSet<usize> = self
            .store
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| {
                doc.metadata
                    .employer()
                    .is_some_and(|e| e.to_lowercase() == wanted)
            })
            .map(|(row, _)| row)
            .collect();
        let total_matched = matching.len();
        if matching.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let query_vector =
            embed_normalized(self.embedding_model.as_ref(), query.unwrap_or(employer)).await?;
        let mut ranked: Vec<(usize, f32)> = self
            .index
            .search(&query_vector, self.index.len())?
            .into_iter()
            .filter(|(row, _)| matching.contains(row))
            .collect();
        if let Some(top_k) = top_k {
            ranked.truncate(top_k);
        }
        Ok(self.collect(ranked, total_matched, false))
    }

    /// Runs [`Retriever::retrieve`] for every requirement on its own.
    ///
    /// A requirement that fails gets its error in its own entry, the rest still run.
    pub async fn retrieve_batch<S: AsRef<str>>(
        &self,
        requirements: &[S],
        top_k: Option<usize>,
    ) -> BTreeMap<String, Result<RetrievalResult, RetrievalError>> {
        let mut results = BTreeMap::new();
        for requirement in requirements {
            let requirement = requirement.as_ref();
            let result = self.retrieve(requirement, top_k, None).await;
            if let Err(e) = &result {
                warn!(requirement, "Batch retrieval item failed: {e}");
            }
            results.insert(requirement.to_string(), result);
        }
        results
    }

    async fn rerank(
        &self,
        reranker: &dyn Reranker,
        query: &str,
        candidates: &[(usize, f32)],
    ) -> Result<Vec<(usize, f32)>, RerankError> {
        let passages: Vec<&str> = candidates
            .iter()
            .map(|(row, _)| self.store.documents[*row].content.as_str())
            .collect();
        let scores = score_checked(reranker, query, &passages).await?;

        let mut rescored: Vec<(usize, f32)> = candidates
            .iter()
            .zip(scores)
            .map(|((row, _), score)| (*row, score))
            .collect();
        rescored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(rescored)
    }

    fn collect(
        &self,
        ranked: Vec<(usize, f32)>,
        total_matched: usize,
        reranked: bool,
    ) -> RetrievalResult {
        let (documents, scores) = ranked
            .into_iter()
            .map(|(row, score)| (self.store.documents[row].clone(), score))
            .unzip();
        RetrievalResult {
            documents,
            scores,
            total_matched,
            reranked,
        }
    }
}
