use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector_store::FLAT_STORE_TYPE;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;
pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Settings shared by the indexer and the retriever.
///
/// Deserialized from JSON, every field is optional:
///
/// ```json
/// {
///     "embedding_model": "text-embedding-3-small",
///     "retrieval_top_k": 5,
///     "similarity_threshold": 0.3,
///     "store_path": "data/vector_store.json",
///     "index_path": "data/vector_store.index"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Model id the store must be built with. When set, indexing with a different model and
    /// opening a store recorded with a different model both fail.
    pub embedding_model: Option<String>,
    pub retrieval_top_k: usize,
    pub similarity_threshold: f32,
    pub vector_store_type: String,
    pub store_path: PathBuf,
    /// Base name of the index files. Each indexing run writes `<stem>.<build_id>.<ext>` next
    /// to it and records that file in the store.
    pub index_path: PathBuf,
    /// Number of documents sent to the embedding model per call.
    pub batch_size: usize,
    /// Whether document embeddings are also written into the store JSON.
    pub store_embeddings: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_model: None,
            retrieval_top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            vector_store_type: FLAT_STORE_TYPE.to_string(),
            store_path: PathBuf::from("data/vector_store.json"),
            index_path: PathBuf::from("data/vector_store.index"),
            batch_size: DEFAULT_BATCH_SIZE,
            store_embeddings: true,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Config writing the store and index into `dir` under their default file names.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            store_path: dir.join("vector_store.json"),
            index_path: dir.join("vector_store.index"),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".to_string()));
        }
        if !self.similarity_threshold.is_finite() {
            return Err(ConfigError::Invalid(
                "similarity_threshold must be a finite number".to_string(),
            ));
        }
        if self.vector_store_type != FLAT_STORE_TYPE {
            return Err(ConfigError::Invalid(format!(
                "unsupported vector_store_type `{}`",
                self.vector_store_type
            )));
        }
        if self.store_path == self.index_path {
            return Err(ConfigError::Invalid(
                "store_path and index_path must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json(
            r#"{"retrieval_top_k": 10, "similarity_threshold": 0.5, "store_path": "/tmp/vs.json"}"#,
        )
        .unwrap();
        assert_eq!(config.retrieval_top_k, 10);
        assert!((config.similarity_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.store_path, PathBuf::from("/tmp/vs.json"));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(matches!(
            Config::from_json(r#"{"top_k": 3}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_json(r#"{"batch_size": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"vector_store_type": "hnsw"}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitae.json");
        std::fs::write(&path, r#"{"batch_size": 8}"#).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().batch_size, 8);
    }
}
