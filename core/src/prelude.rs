pub use crate::chunker::{ExperienceRecord, ExperienceSource, ResumeDocument};
pub use crate::config::Config;
pub use crate::document::{Document, Metadata};
pub use crate::embeddings::EmbeddingModel;
pub use crate::indexer::{IndexResult, Indexer};
pub use crate::loader::{DirectLoader, FileLoader, FileLoaderBuilder, Loader};
pub use crate::rerank::Reranker;
pub use crate::retriever::{RetrievalResult, Retriever};
