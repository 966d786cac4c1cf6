//! Turns experience records into one [`Document`] per achievement bullet.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::document::{
    Document, Metadata, BULLET_INDEX, DATES, EMPLOYER, LOCATION, RECORD_ID, ROLE, SKILLS, SOURCE,
    TECHNOLOGIES,
};
use crate::persist::write_atomically;

#[derive(Debug, Error)]
pub enum ChunkerError {
    #[error("Documents file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse documents file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize documents: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// A single position held, as kept by the record store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "company")]
    pub employer: String,
    #[serde(default, alias = "title", alias = "position")]
    pub role: String,
    #[serde(default, alias = "date_range")]
    pub dates: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, alias = "tech_stack")]
    pub technologies: Vec<String>,
    #[serde(default, alias = "achievements", alias = "highlights")]
    pub bullets: Vec<String>,
}

/// A resume with a nested experience section. Other sections are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeDocument {
    #[serde(default, alias = "experiences", alias = "work_experience")]
    pub experience: Vec<ExperienceRecord>,
}

/// A named collection of experience records.
#[derive(Debug, Clone, PartialEq)]
pub enum ExperienceSource {
    /// A flat list of records, eg the master experience file.
    Records {
        name: String,
        records: Vec<ExperienceRecord>,
    },
    /// The experience section of a resume document.
    Resume { name: String, resume: ResumeDocument },
}

impl ExperienceSource {
    /// Tag written to the `source` metadata of every document chunked from this collection.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Records { name, .. } | Self::Resume { name, .. } => name,
        }
    }

    #[must_use]
    pub fn records(&self) -> &[ExperienceRecord] {
        match self {
            Self::Records { records, .. } => records,
            Self::Resume { resume, .. } => &resume.experience,
        }
    }
}

/// Chunks every source, in order. Whitespace-only bullets produce no document.
pub fn chunk(sources: &[ExperienceSource]) -> Vec<Document> {
    sources
        .iter()
        .flat_map(|source| chunk_records(source.name(), source.records()))
        .collect()
}

/// Creates one document per non-blank bullet of each record, tagging it with `source`.
///
/// The content is the bullet verbatim. Document ids are random, everything else depends only
/// on the input, so chunking the same records twice yields the same contents and metadata.
pub fn chunk_records(source: &str, records: &[ExperienceRecord]) -> Vec<Document> {
    let mut documents = Vec::new();
    for (record_index, record) in records.iter().enumerate() {
        let record_id = record
            .id
            .clone()
            .unwrap_or_else(|| format!("{source}:{record_index}"));

        for (bullet_index, bullet) in record.bullets.iter().enumerate() {
            if bullet.trim().is_empty() {
                continue;
            }
            let metadata = Metadata::new()
                .with(EMPLOYER, record.employer.as_str())
                .with(ROLE, record.role.as_str())
                .with(DATES, record.dates.as_str())
                .with(LOCATION, record.location.as_str())
                .with(SKILLS, record.skills.clone())
                .with(TECHNOLOGIES, record.technologies.clone())
                .with(SOURCE, source)
                .with(RECORD_ID, record_id.as_str())
                .with(BULLET_INDEX, bullet_index);
            documents.push(Document::new(bullet.as_str(), metadata));
        }
    }
    debug!(source, records = records.len(), documents = documents.len(), "chunked records");
    documents
}

/// Writes `documents` as a JSON array, replacing any existing file atomically.
pub fn save_documents(documents: &[Document], path: &Path) -> Result<(), ChunkerError> {
    let bytes = serde_json::to_vec_pretty(documents).map_err(ChunkerError::Serialize)?;
    write_atomically(path, &bytes).map_err(|source| ChunkerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads documents written by [`save_documents`].
pub fn load_documents(path: &Path) -> Result<Vec<Document>, ChunkerError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ChunkerError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ChunkerError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_str(&contents).map_err(|source| ChunkerError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> ExperienceRecord {
        ExperienceRecord {
            id: Some("exp-1".to_string()),
            employer: "Tech Corp".to_string(),
            role: "Senior Engineer".to_string(),
            dates: "2020 - 2023".to_string(),
            location: "Remote".to_string(),
            skills: vec!["Leadership".to_string()],
            technologies: vec!["Python".to_string(), "AWS".to_string()],
            bullets: vec![
                "Built Python microservices on AWS".to_string(),
                "Led team using Agile".to_string(),
            ],
        }
    }

    #[test]
    fn test_one_document_per_bullet() {
        let docs = chunk_records("experiences", &[record()]);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "Built Python microservices on AWS");
        assert_eq!(docs[1].content, "Led team using Agile");
        assert!(docs.iter().all(|d| d.embedding.is_none()));

        let m = &docs[0].metadata;
        assert_eq!(m.employer(), Some("Tech Corp"));
        assert_eq!(m.role(), Some("Senior Engineer"));
        assert_eq!(m.get_str(DATES), Some("2020 - 2023"));
        assert_eq!(m.get_str(LOCATION), Some("Remote"));
        assert_eq!(m.skills(), vec!["Leadership"]);
        assert_eq!(m.technologies(), vec!["Python", "AWS"]);
        assert_eq!(m.source(), Some("experiences"));
        assert_eq!(m.get_str(RECORD_ID), Some("exp-1"));
        assert_eq!(docs[1].metadata.get(BULLET_INDEX), Some(&json!(1)));
    }

    #[test]
    fn test_record_without_bullets_contributes_nothing() {
        let empty = ExperienceRecord {
            bullets: Vec::new(),
            ..record()
        };
        assert!(chunk_records("experiences", &[empty]).is_empty());
    }

    #[test]
    fn test_blank_bullets_are_skipped() {
        let r = ExperienceRecord {
            bullets: vec!["  ".to_string(), "Shipped v2".to_string()],
            ..record()
        };
        let docs = chunk_records("experiences", &[r]);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.get(BULLET_INDEX), Some(&json!(1)));
    }

    #[test]
    fn test_chunking_is_deterministic_except_ids() {
        let sources = vec![
            ExperienceSource::Records {
                name: "experiences".to_string(),
                records: vec![record()],
            },
            ExperienceSource::Resume {
                name: "resume-2024".to_string(),
                resume: ResumeDocument {
                    experience: vec![ExperienceRecord { id: None, ..record() }],
                },
            },
        ];
        let first = chunk(&sources);
        let second = chunk(&sources);
        assert_eq!(first.len(), 4);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.content, b.content);
            assert_eq!(a.metadata, b.metadata);
            assert_ne!(a.id, b.id);
        }
        assert_eq!(first[2].metadata.source(), Some("resume-2024"));
        assert_eq!(first[2].metadata.get_str(RECORD_ID), Some("resume-2024:0"));
    }

    #[test]
    fn test_record_field_aliases() {
        let r: ExperienceRecord = serde_json::from_value(json!({
            "company": "Tech Corp",
            "title": "Engineer",
            "tech_stack": ["Rust"],
            "achievements": ["Cut p99 latency by 40%"]
        }))
        .unwrap();
        assert_eq!(r.employer, "Tech Corp");
        assert_eq!(r.role, "Engineer");
        assert_eq!(r.technologies, vec!["Rust"]);
        assert_eq!(r.bullets, vec!["Cut p99 latency by 40%"]);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.json");
        let mut docs = chunk_records("experiences", &[record()]);
        docs[0].embedding = Some(vec![0.25, -0.5]);

        save_documents(&docs, &path).unwrap();
        assert_eq!(load_documents(&path).unwrap(), docs);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_documents(&dir.path().join("missing.json")),
            Err(ChunkerError::NotFound { .. })
        ));
    }
}
