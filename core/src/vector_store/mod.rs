use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::document::Document;
use crate::persist::write_atomically;

/// Backend tag written for stores indexed with [`crate::index::FlatIndex`].
pub const FLAT_STORE_TYPE: &str = "flat";

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Vector store not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Vector store io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse vector store {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize vector store: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Invalid vector store: {0}")]
    Invalid(String),
}

/// Store-wide settings, written next to the documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Id of the indexing run that wrote this store, also recorded in its index header.
    pub build_id: Uuid,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub retrieval_top_k: usize,
    pub similarity_threshold: f32,
    pub vector_store_type: String,
    pub document_count: usize,
    /// Location of the binary index, relative to the store file's directory unless absolute.
    pub index_path: String,
}

/// The persisted collection of indexed documents.
///
/// `documents[i]` is the document for row `i` of the companion index. A store is written once
/// per indexing run and only ever read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStore {
    pub metadata: StoreMetadata,
    pub documents: Vec<Document>,
}

impl VectorStore {
    /// Loads and validates the store at `path`.
    ///
    /// # Errors
    /// - [`VectorStoreError::NotFound`] if there is no file at `path`
    /// - [`VectorStoreError::Parse`] if the file isn't a valid store
    /// - [`VectorStoreError::Invalid`] if the documents break the store invariants
    pub fn load(path: &Path) -> Result<Self, VectorStoreError> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                VectorStoreError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                VectorStoreError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let store: Self =
            serde_json::from_str(&contents).map_err(|source| VectorStoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        store.validate()?;
        info!(
            path = %path.display(),
            documents = store.documents.len(),
            model = %store.metadata.embedding_model,
            "vector store loaded"
        );
        Ok(store)
    }

    /// Writes the store to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<(), VectorStoreError> {
        self.validate()?;
        let bytes = serde_json::to_vec_pretty(self).map_err(VectorStoreError::Serialize)?;
        write_atomically(path, &bytes).map_err(|source| VectorStoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the invariants every store must hold: the backend is one this crate reads, the
    /// recorded count matches, ids are unique and every stored embedding has the store dimension.
    pub fn validate(&self) -> Result<(), VectorStoreError> {
        if self.metadata.vector_store_type != FLAT_STORE_TYPE {
            return Err(VectorStoreError::Invalid(format!(
                "unsupported vector_store_type `{}`",
                self.metadata.vector_store_type
            )));
        }
        if self.metadata.document_count != self.documents.len() {
            return Err(VectorStoreError::Invalid(format!(
                "metadata records {} documents, store holds {}",
                self.metadata.document_count,
                self.documents.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.documents.len());
        for doc in &self.documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(VectorStoreError::Invalid(format!(
                    "duplicate document id `{}`",
                    doc.id
                )));
            }
            if let Some(embedding) = &doc.embedding {
                if embedding.len() != self.metadata.embedding_dimension {
                    return Err(VectorStoreError::Invalid(format!(
                        "document `{}` has a {} dimensional embedding, store dimension is {}",
                        doc.id,
                        embedding.len(),
                        self.metadata.embedding_dimension
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolves the recorded index location against the directory holding the store file.
    #[must_use]
    pub fn resolve_index_path(&self, store_path: &Path) -> PathBuf {
        let index_path = Path::new(&self.metadata.index_path);
        if index_path.is_absolute() {
            return index_path.to_path_buf();
        }
        match store_path.parent() {
            Some(dir) => dir.join(index_path),
            None => index_path.to_path_buf(),
        }
    }
}

/// The file a single indexing run writes its index to, derived from the configured
/// `index_path`: `data/vector_store.index` becomes `data/vector_store.<build_id>.index`.
pub(crate) fn index_path_for_build(index_path: &Path, build_id: Uuid) -> PathBuf {
    let stem = index_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match index_path.extension() {
        Some(ext) => format!("{stem}.{build_id}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{build_id}"),
    };
    index_path.with_file_name(file_name)
}

/// Expresses `index_path` relative to the directory of `store_path` when the index lives
/// inside it, so a store directory can be moved as a whole.
pub(crate) fn index_path_for_store(store_path: &Path, index_path: &Path) -> String {
    let relative = store_path
        .parent()
        .and_then(|dir| index_path.strip_prefix(dir).ok())
        .filter(|p| !p.as_os_str().is_empty());
    match relative {
        Some(p) => p.to_string_lossy().into_owned(),
        None => index_path.to_string_lossy().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Metadata, EMPLOYER};

    fn store(documents: Vec<Document>) -> VectorStore {
        VectorStore {
            metadata: StoreMetadata {
                build_id: Uuid::nil(),
                embedding_model: "hashing-2".to_string(),
                embedding_dimension: 2,
                retrieval_top_k: 5,
                similarity_threshold: 0.3,
                vector_store_type: FLAT_STORE_TYPE.to_string(),
                document_count: documents.len(),
                index_path: "vector_store.index".to_string(),
            },
            documents,
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector_store.json");
        let tech_corp = Metadata::new().with(EMPLOYER, "Tech Corp");
        let original = store(vec![
            Document::new_with_id("a", "Built Python microservices on AWS", tech_corp)
                .with_embedding(vec![0.6, 0.8]),
            Document::new_with_id("b", "Led team using Agile", Metadata::new()),
        ]);
        original.save(&path).unwrap();

        let loaded = VectorStore::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let result = VectorStore::load(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(VectorStoreError::NotFound { .. })));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector_store.json");
        std::fs::write(&path, "{\"metadata\": 3}").unwrap();
        assert!(matches!(
            VectorStore::load(&path),
            Err(VectorStoreError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let s = store(vec![
            Document::new_with_id("a", "one", Metadata::new()),
            Document::new_with_id("a", "two", Metadata::new()),
        ]);
        assert!(matches!(s.validate(), Err(VectorStoreError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_wrong_embedding_length() {
        let s = store(vec![
            Document::new_with_id("a", "one", Metadata::new()).with_embedding(vec![1.0, 0.0, 0.0])
        ]);
        assert!(matches!(s.validate(), Err(VectorStoreError::Invalid(_))));
    }

    #[test]
    fn test_load_rejects_unknown_store_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector_store.json");
        let mut s = store(Vec::new());
        s.metadata.vector_store_type = "hnsw".to_string();
        let bytes = serde_json::to_vec(&s).unwrap();
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            VectorStore::load(&path),
            Err(VectorStoreError::Invalid(reason)) if reason.contains("hnsw")
        ));
    }

    #[test]
    fn test_index_path_for_build() {
        let build_id = Uuid::new_v4();
        assert_eq!(
            index_path_for_build(Path::new("/data/vector_store.index"), build_id),
            PathBuf::from(format!("/data/vector_store.{build_id}.index"))
        );
        assert_eq!(
            index_path_for_build(Path::new("vectors"), build_id),
            PathBuf::from(format!("vectors.{build_id}"))
        );
    }

    #[test]
    fn test_validate_rejects_count_mismatch() {
        let mut s = store(vec![Document::new_with_id("a", "one", Metadata::new())]);
        s.metadata.document_count = 2;
        assert!(matches!(s.validate(), Err(VectorStoreError::Invalid(_))));
    }

    #[test]
    fn test_index_path_resolution() {
        let store_path = Path::new("/data/run1/vector_store.json");
        let recorded = index_path_for_store(store_path, Path::new("/data/run1/vector_store.index"));
        assert_eq!(recorded, "vector_store.index");

        let mut s = store(Vec::new());
        s.metadata.index_path = recorded;
        assert_eq!(
            s.resolve_index_path(store_path),
            PathBuf::from("/data/run1/vector_store.index")
        );

        let elsewhere = index_path_for_store(store_path, Path::new("/indexes/vs.index"));
        assert_eq!(elsewhere, "/indexes/vs.index");
    }
}
