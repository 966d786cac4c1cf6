//! Sources of experience records for the chunker.

pub mod direct;
pub mod file;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::chunker::ExperienceSource;

pub use direct::DirectLoader;
pub use file::{FileLoader, FileLoaderBuilder};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Invalid glob-pattern")]
    InvalidGlobPattern(#[from] glob::PatternError),
    #[error("No matching files found")]
    NoMatchingFiles,
    #[error("Failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Produces the experience collections to be chunked.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self) -> Result<Vec<ExperienceSource>, LoaderError>;
}
