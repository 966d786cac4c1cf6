use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunker;
use crate::config::{Config, ConfigError};
use crate::document::Document;
use crate::embeddings::model::check_dimension;
use crate::embeddings::{normalize, EmbedderError, EmbeddingModel};
use crate::index::{FlatIndex, IndexError};
use crate::loader::{Loader, LoaderError};
use crate::vector_store::{
    index_path_for_build, index_path_for_store, StoreMetadata, VectorStore, VectorStoreError,
};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Duplicate document id `{0}`")]
    DuplicateId(String),
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedderError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Store(#[from] VectorStoreError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
}

/// Outcome of a successful indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexResult {
    pub build_id: Uuid,
    pub document_count: usize,
    pub store_path: PathBuf,
    /// The index file written by this run, see [`Indexer::index`].
    pub index_path: PathBuf,
}

/// Embeds documents and persists them as a vector store plus a flat index.
pub struct Indexer {
    embedding_model: Arc<dyn EmbeddingModel>,
}

impl Indexer {
    #[must_use]
    pub fn new(embedding_model: Arc<dyn EmbeddingModel>) -> Self {
        Self { embedding_model }
    }

    /// Builds and persists a fresh store and index for `documents`.
    ///
    /// Every document is embedded and checked before anything touches the disk. Each run gets
    /// a new build id and writes its index to its own file beside `config.index_path`
    /// (`vector_store.<build_id>.index`), then atomically replaces the store, which records
    /// that file and the build id. Replacing the store is the single commit point: a failed
    /// run leaves the previous store and its index untouched, and a reader always gets the
    /// index built with the store it loaded. The previous run's index is removed after the
    /// commit. Row `i` of the index is always `documents[i]`.
    ///
    /// # Errors
    /// Fails if the config is invalid or names a different embedding model, two documents
    /// share an id, the embedding model fails or returns vectors of the wrong length, or
    /// either file can't be written.
    pub async fn index(
        &self,
        documents: &[Document],
        config: &Config,
    ) -> Result<IndexResult, IndexerError> {
        config.validate()?;
        let model = self.embedding_model.as_ref();
        if let Some(expected) = &config.embedding_model {
            if expected != model.model_id() {
                return Err(ConfigError::Invalid(format!(
                    "config names embedding model `{expected}`, indexer uses `{}`",
                    model.model_id()
                ))
                .into());
            }
        }

        let mut seen = HashSet::with_capacity(documents.len());
        if let Some(dup) = documents.iter().find(|d| !seen.insert(d.id.as_str())) {
            return Err(IndexerError::DuplicateId(dup.id.clone()));
        }

        let build_id = Uuid::new_v4();
        let embeddings = self.embed_all(documents, config.batch_size).await?;
        let index =
            FlatIndex::from_vectors(model.dimension(), embeddings.iter().map(Vec::as_slice))?
                .with_build_id(build_id);

        let documents: Vec<Document> = documents
            .iter()
            .zip(embeddings)
            .map(|(doc, embedding)| Document {
                embedding: config.store_embeddings.then_some(embedding),
                ..doc.clone()
            })
            .collect();

        let index_path = index_path_for_build(&config.index_path, build_id);
        let store = VectorStore {
            metadata: StoreMetadata {
                build_id,
                embedding_model: model.model_id().to_string(),
                embedding_dimension: model.dimension(),
                retrieval_top_k: config.retrieval_top_k,
                similarity_threshold: config.similarity_threshold,
                vector_store_type: config.vector_store_type.clone(),
                document_count: documents.len(),
                index_path: index_path_for_store(&config.store_path, &index_path),
            },
            documents,
        };
        store.validate()?;

        let previous_index = previous_index_path(&config.store_path);
        index.write(&index_path)?;
        if let Err(e) = store.save(&config.store_path) {
            remove_index(&index_path);
            return Err(e.into());
        }
        if let Some(previous) = previous_index.filter(|p| *p != index_path) {
            remove_index(&previous);
        }

        info!(
            build = %build_id,
            documents = store.documents.len(),
            model = %store.metadata.embedding_model,
            store = %config.store_path.display(),
            index = %index_path.display(),
            "index built"
        );
        Ok(IndexResult {
            build_id,
            document_count: store.documents.len(),
            store_path: config.store_path.clone(),
            index_path,
        })
    }

    /// Loads every source from `loader`, chunks it and indexes the resulting documents.
    pub async fn index_from_loader(
        &self,
        loader: &dyn Loader,
        config: &Config,
    ) -> Result<IndexResult, IndexerError> {
        let sources = loader.load().await?;
        let documents = chunker::chunk(&sources);
        self.index(&documents, config).await
    }

    async fn embed_all(
        &self,
        documents: &[Document],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let model = self.embedding_model.as_ref();
        let mut embeddings = Vec::with_capacity(documents.len());

        for batch in documents.chunks(batch_size.max(1)) {
            let contents: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let vectors = model.embed_batch(&contents).await?;
            if vectors.len() != batch.len() {
                return Err(EmbedderError::CountMismatch {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }
            for mut vector in vectors {
                check_dimension(model, vector.len())?;
                normalize(&mut vector);
                embeddings.push(vector);
            }
            debug!(embedded = embeddings.len(), total = documents.len(), "embedded batch");
        }
        Ok(embeddings)
    }
}

/// Index file of the store currently at `store_path`, if there is a readable one.
fn previous_index_path(store_path: &Path) -> Option<PathBuf> {
    let contents = std::fs::read_to_string(store_path).ok()?;
    let store: VectorStore = serde_json::from_str(&contents).ok()?;
    Some(store.resolve_index_path(store_path))
}

fn remove_index(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed index file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove index file: {e}"),
    }
}
