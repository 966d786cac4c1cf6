use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::Pattern;
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{Loader, LoaderError};
use crate::chunker::{ExperienceRecord, ExperienceSource, ResumeDocument};

/// A builder for constructing a [`FileLoader`].
///
/// Takes a list of glob patterns, matched directories are walked recursively for `.json` files.
pub struct FileLoaderBuilder {
    glob_patterns: Vec<String>,
}

impl FileLoaderBuilder {
    /// Creates a new `FileLoaderBuilder` instance.
    ///
    /// # Errors
    /// Returns [`LoaderError::InvalidGlobPattern`] if any of the patterns doesn't parse.
    pub fn new(glob_patterns: Vec<String>) -> Result<Self, LoaderError> {
        for pattern in &glob_patterns {
            Pattern::new(pattern)?;
        }
        Ok(Self { glob_patterns })
    }

    /// Resolves the patterns to files.
    ///
    /// # Errors
    /// Returns [`LoaderError::NoMatchingFiles`] if none of the patterns matches a file.
    pub fn build(self) -> Result<FileLoader, LoaderError> {
        let files = resolve_input_to_files(&self.glob_patterns)?;
        if files.is_empty() {
            return Err(LoaderError::NoMatchingFiles);
        }
        Ok(FileLoader { files })
    }
}

/// Loads experience collections from JSON files.
///
/// A file holding a JSON array is read as a flat list of records, anything else as a resume
/// document with an `experience` section. The file stem becomes the source name.
#[derive(Debug, Clone)]
pub struct FileLoader {
    files: Vec<PathBuf>,
}

impl FileLoader {
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

#[async_trait]
impl Loader for FileLoader {
    async fn load(&self) -> Result<Vec<ExperienceSource>, LoaderError> {
        let mut sources = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let contents =
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| LoaderError::Io {
                        path: path.clone(),
                        source,
                    })?;
            sources.push(parse_source(path, &contents)?);
        }
        Ok(sources)
    }
}

fn resolve_input_to_files(inputs: &[String]) -> Result<Vec<PathBuf>, LoaderError> {
    let mut files = Vec::new();

    for input in inputs {
        for entry in glob::glob(input)? {
            match entry {
                Ok(path) => {
                    if path.is_dir() {
                        for entry in WalkDir::new(&path) {
                            let entry = entry.map_err(|source| LoaderError::Walk {
                                path: path.clone(),
                                source,
                            })?;
                            if entry.file_type().is_file() && is_json(entry.path()) {
                                files.push(entry.path().to_path_buf());
                            }
                        }
                    } else if path.is_file() {
                        files.push(path);
                    }
                }
                Err(e) => warn!("Glob error: {e}"),
            }
        }
    }

    files.sort();
    files.dedup();
    debug!(files = files.len(), "resolved record files");
    Ok(files)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

fn parse_source(path: &Path, contents: &str) -> Result<ExperienceSource, LoaderError> {
    let parse_error = |source| LoaderError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let value: Value = serde_json::from_str(contents).map_err(parse_error)?;
    if value.is_array() {
        let records: Vec<ExperienceRecord> = serde_json::from_value(value).map_err(parse_error)?;
        Ok(ExperienceSource::Records { name, records })
    } else {
        let resume: ResumeDocument = serde_json::from_value(value).map_err(parse_error)?;
        Ok(ExperienceSource::Resume { name, resume })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDS: &str = r#"[
        {"employer": "Tech Corp", "role": "Engineer",
         "bullets": ["Built Python microservices on AWS"]},
        {"employer": "Startup", "role": "CTO", "bullets": []}
    ]"#;

    const RESUME: &str = r#"{
        "name": "Jane Doe",
        "summary": "Engineer",
        "experience": [
            {"company": "Tech Corp", "title": "Engineer", "highlights": ["Led team using Agile"]}
        ]
    }"#;

    #[test]
    fn test_invalid_pattern() {
        let result = FileLoaderBuilder::new(vec!["data/[".to_string()]);
        assert!(matches!(result, Err(LoaderError::InvalidGlobPattern(_))));
    }

    #[test]
    fn test_no_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.json", dir.path().display());
        let result = FileLoaderBuilder::new(vec![pattern]).unwrap().build();
        assert!(matches!(result, Err(LoaderError::NoMatchingFiles)));
    }

    #[tokio::test]
    async fn test_loads_records_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("experiences.json"), RECORDS).unwrap();
        std::fs::create_dir(dir.path().join("resumes")).unwrap();
        std::fs::write(dir.path().join("resumes/jane.json"), RESUME).unwrap();
        std::fs::write(dir.path().join("resumes/notes.txt"), "not json").unwrap();

        let loader = FileLoaderBuilder::new(vec![
            format!("{}/experiences.json", dir.path().display()),
            format!("{}/resumes", dir.path().display()),
        ])
        .unwrap()
        .build()
        .unwrap();
        assert_eq!(loader.files().len(), 2);

        let sources = loader.load().await.unwrap();
        assert_eq!(sources.len(), 2);

        let records = sources.iter().find(|s| s.name() == "experiences").unwrap();
        assert!(matches!(records, ExperienceSource::Records { .. }));
        assert_eq!(records.records().len(), 2);

        let resume = sources.iter().find(|s| s.name() == "jane").unwrap();
        assert!(matches!(resume, ExperienceSource::Resume { .. }));
        assert_eq!(resume.records()[0].employer, "Tech Corp");
        assert_eq!(resume.records()[0].bullets, vec!["Led team using Agile"]);
    }

    #[tokio::test]
    async fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[{\"bullets\": 3}]").unwrap();

        let loader = FileLoaderBuilder::new(vec![path.display().to_string()])
            .unwrap()
            .build()
            .unwrap();
        match loader.load().await {
            Err(LoaderError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
