use crate::{
    chunker::ChunkerError, config::ConfigError, embeddings::EmbedderError, index::IndexError,
    indexer::IndexerError, loader::LoaderError, rerank::RerankError, retriever::RetrievalError,
    vector_store::VectorStoreError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error")]
    Config(#[from] ConfigError),
    #[error("Loader error")]
    Loader(#[from] LoaderError),
    #[error("Chunker error")]
    Chunker(#[from] ChunkerError),
    #[error("Embedder error")]
    Embedder(#[from] EmbedderError),
    #[error("Rerank error")]
    Rerank(#[from] RerankError),
    #[error("Index error")]
    Index(#[from] IndexError),
    #[error("VectorStore error")]
    VectorStore(#[from] VectorStoreError),
    #[error("Indexer error")]
    Indexer(#[from] IndexerError),
    #[error("Retrieval error")]
    Retrieval(#[from] RetrievalError),
}

pub type Result<T> = std::result::Result<T, Error>;
