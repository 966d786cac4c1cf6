pub mod flat;

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

pub use flat::FlatIndex;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Index io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt index file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("Vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Nearest neighbour search over the rows of an index.
///
/// Row `i` of an index always corresponds to `documents[i]` of the vector store it was built
/// with, so implementations must never reorder rows.
pub trait VectorIndex: Send + Sync {
    /// Returns up to `k` `(row, score)` pairs, best first.
    ///
    /// # Errors
    /// Fails with [`IndexError::DimensionMismatch`] if `query` doesn't match the index dimension.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError>;

    fn dimension(&self) -> usize;

    /// Id of the indexing run that produced this index, for backends that record one.
    fn build_id(&self) -> Option<Uuid> {
        None
    }

    /// Number of rows in the index.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
