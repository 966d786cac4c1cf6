//! # vitae - Core API Documentation
//!
//! vitae turns work-experience records into ranked evidence for tailoring a resume to a job.
//!
//! ## Features
//!
//! - **Modular Architecture** with clearly defined components:
//!   - **Loaders**: Experience records from memory or from JSON files matched by glob patterns
//!   - **Chunker**: One retrievable document per achievement bullet, with provenance metadata
//!   - **Embedders**: Text embedding providers, a local hashing model and OpenAI builtin
//!   - **Indexer**: Normalized embeddings in an exact inner-product index, persisted atomically
//!   - **Retriever**: Top-K similarity search with threshold filtering and optional reranking
//!
//! ## Examples
//!
//! ### Indexing and querying
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vitae::prelude::*;
//! use vitae::providers::embeddings::HashingEmbedding;
//!
//! #[tokio::main]
//! async fn main() -> vitae::error::Result<()> {
//!     let config = Config::from_file("vitae.json".as_ref())?;
//!     let model: Arc<dyn EmbeddingModel> = Arc::new(HashingEmbedding::default());
//!
//!     let loader = FileLoaderBuilder::new(vec!["data/records/**/*.json".to_string()])?.build()?;
//!     Indexer::new(model.clone())
//!         .index_from_loader(&loader, &config)
//!         .await?;
//!
//!     // build once, query many times
//!     let retriever = Retriever::builder(&config.store_path, model)
//!         .with_config(&config)
//!         .build()?;
//!
//!     let evidence = retriever.retrieve_by_requirement("5+ years of Python").await?;
//!     for (doc, score) in evidence.iter() {
//!         println!("{score:.3} {} ({:?})", doc.content, doc.metadata.employer());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Reranking
//!
//! A reranker is a second ranking stage over the similarity candidates. Pass the result of
//! constructing one to [`retriever::RetrieverBuilder::try_reranker`], if it failed to load the
//! retriever ranks by similarity alone and reports `reranked: false` on every result.

/// Chunking experience records into documents
pub mod chunker;

/// Indexer and retriever settings
pub mod config;

/// Document and metadata types
pub mod document;

/// Text embeddings support
pub mod embeddings;

/// Error types for all library operations
pub mod error;

/// Nearest neighbour index backends
pub mod index;

/// Building and persisting a vector store and its index
pub mod indexer;

/// Experience record loading utilities
pub mod loader;

/// Convenience prelude exports
pub mod prelude;

/// Builtin embedding model providers
pub mod providers;

/// Second stage relevance scoring
pub mod rerank;

/// Querying a persisted vector store
pub mod retriever;

/// The persisted vector store
pub mod vector_store;

mod persist;
