use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key for the employer a bullet was written for.
pub const EMPLOYER: &str = "employer";
/// Metadata key for the role held at the employer.
pub const ROLE: &str = "role";
/// Metadata key for the free-form date range of the role.
pub const DATES: &str = "dates";
/// Metadata key for the role's location.
pub const LOCATION: &str = "location";
/// Metadata key for the skill tags of the source record.
pub const SKILLS: &str = "skills";
/// Metadata key for the technology tags of the source record.
pub const TECHNOLOGIES: &str = "technologies";
/// Metadata key naming the input collection a record came from.
pub const SOURCE: &str = "source";
/// Metadata key for the id of the record a bullet was taken from.
pub const RECORD_ID: &str = "record_id";
/// Metadata key for the position of the bullet inside its record.
pub const BULLET_INDEX: &str = "bullet_index";

/// Ordered key/value provenance attached to a [`Document`].
///
/// Keys keep their insertion order, so a document written to disk and read back
/// lists its facets in the order the chunker produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style insert, used by the chunker and in tests.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value under `key` if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns the string items of the list under `key`, skipping non-string items.
    #[must_use]
    pub fn get_list(&self, key: &str) -> Vec<&str> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn employer(&self) -> Option<&str> {
        self.get_str(EMPLOYER)
    }

    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.get_str(ROLE)
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.get_str(SOURCE)
    }

    #[must_use]
    pub fn skills(&self) -> Vec<&str> {
        self.get_list(SKILLS)
    }

    #[must_use]
    pub fn technologies(&self) -> Vec<&str> {
        self.get_list(TECHNOLOGIES)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An atomic retrievable unit, usually a single achievement bullet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within a vector store.
    pub id: String,
    /// The text that gets embedded and matched.
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Present once the document has been indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Creates a document with a fresh random id.
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self::new_with_id(uuid::Uuid::new_v4().to_string(), content, metadata)
    }

    pub fn new_with_id(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_keeps_insertion_order() {
        let metadata = Metadata::new()
            .with(ROLE, "Engineer")
            .with(EMPLOYER, "Tech Corp")
            .with(DATES, "2020 - 2022");
        let keys: Vec<&str> = metadata.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec![ROLE, EMPLOYER, DATES]);
    }

    #[test]
    fn test_metadata_accessors() {
        let metadata = Metadata::new()
            .with(EMPLOYER, "Tech Corp")
            .with(SKILLS, json!(["Python", 3, "AWS"]));
        assert_eq!(metadata.employer(), Some("Tech Corp"));
        assert_eq!(metadata.role(), None);
        assert_eq!(metadata.skills(), vec!["Python", "AWS"]);
        assert!(metadata.technologies().is_empty());
    }

    #[test]
    fn test_document_json_omits_missing_embedding() {
        let doc = Document::new_with_id("1", "Led team using Agile", Metadata::new());
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("embedding").is_none());

        let embedded = doc.with_embedding(vec![0.6, 0.8]);
        let value = serde_json::to_value(&embedded).unwrap();
        assert_eq!(value["embedding"], json!([0.6f32, 0.8f32]));
    }

    #[test]
    fn test_new_documents_get_distinct_ids() {
        let a = Document::new("same", Metadata::new());
        let b = Document::new("same", Metadata::new());
        assert_ne!(a.id, b.id);
    }
}
