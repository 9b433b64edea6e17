//! The document type that flows through pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

/// The kind of content a document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Plain text.
    #[default]
    Text,
    /// Raw HTML.
    Html,
    /// PDF content.
    Pdf,
    /// An image.
    Image,
    /// An audio clip.
    Audio,
    /// Source code.
    Code,
}

/// Lifecycle status of a document within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Not yet handled by any stage.
    #[default]
    Pending,
    /// Currently being processed.
    Processing,
    /// Fully processed.
    Completed,
    /// Processing failed.
    Failed,
}

/// Provenance and descriptive metadata for a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Name of the source plugin that produced the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Origin URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Title, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Publication timestamp, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// Free-form extras.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl DocumentMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source plugin name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the origin URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Adds a free-form extra entry.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// One entry in a document's processing history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStep {
    /// The plugin or stage that touched the document.
    pub stage: String,
    /// Step details.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub info: HashMap<String, serde_json::Value>,
    /// When the step ran.
    pub at: DateTime<Utc>,
}

/// A content item flowing through the pipeline.
///
/// Documents are created by source plugins and mutated in place by
/// processors; the engine itself only touches status and history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier.
    pub id: Uuid,
    /// Raw content as fetched.
    pub content: String,
    /// Cleaned/derived content, when a processor has produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_content: Option<String>,
    /// Content kind.
    #[serde(default)]
    pub doc_type: DocumentType,
    /// Provenance metadata.
    #[serde(default)]
    pub metadata: DocumentMetadata,
    /// Lifecycle status.
    #[serde(default)]
    pub status: DocumentStatus,
    /// Append-only processing history.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ProcessingStep>,
}

impl Document {
    /// Creates a new pending document.
    #[must_use]
    pub fn new(content: impl Into<String>, doc_type: DocumentType) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            clean_content: None,
            doc_type,
            metadata: DocumentMetadata::default(),
            status: DocumentStatus::Pending,
            history: Vec::new(),
        }
    }

    /// Creates a plain-text document.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(content, DocumentType::Text)
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    /// The content downstream stages should read: cleaned when available,
    /// raw otherwise.
    #[must_use]
    pub fn effective_content(&self) -> &str {
        self.clean_content.as_deref().unwrap_or(&self.content)
    }

    /// Appends a history entry with no details.
    pub fn add_processing_step(&mut self, stage: impl Into<String>) {
        self.add_processing_step_with(stage, HashMap::new());
    }

    /// Appends a history entry with details.
    pub fn add_processing_step_with(
        &mut self,
        stage: impl Into<String>,
        info: HashMap<String, serde_json::Value>,
    ) {
        self.history.push(ProcessingStep {
            stage: stage.into(),
            info,
            at: Utc::now(),
        });
    }

    /// SHA-256 hex digest of the effective content.
    ///
    /// Stable across serialization, usable as a deduplication key.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.effective_content().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_document_defaults() {
        let doc = Document::text("hello");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.doc_type, DocumentType::Text);
        assert!(doc.history.is_empty());
        assert!(doc.clean_content.is_none());
    }

    #[test]
    fn test_effective_content_prefers_clean() {
        let mut doc = Document::new("<p>hi</p>", DocumentType::Html);
        assert_eq!(doc.effective_content(), "<p>hi</p>");

        doc.clean_content = Some("hi".to_string());
        assert_eq!(doc.effective_content(), "hi");
    }

    #[test]
    fn test_processing_history_is_ordered() {
        let mut doc = Document::text("x");
        doc.add_processing_step("fetcher");
        doc.add_processing_step_with(
            "cleaner",
            [("removed".to_string(), json!(3))].into_iter().collect(),
        );

        assert_eq!(doc.history.len(), 2);
        assert_eq!(doc.history[0].stage, "fetcher");
        assert_eq!(doc.history[1].stage, "cleaner");
        assert_eq!(doc.history[1].info.get("removed"), Some(&json!(3)));
    }

    #[test]
    fn test_content_hash_follows_effective_content() {
        let mut a = Document::text("same text");
        let b = Document::text("same text");
        assert_eq!(a.content_hash(), b.content_hash());

        a.clean_content = Some("different".to_string());
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut doc = Document::new("body", DocumentType::Html).with_metadata(
            DocumentMetadata::new()
                .with_source("web_search")
                .with_url("https://example.com")
                .with_title("Example")
                .with_extra("rank", json!(1)),
        );
        doc.add_processing_step("web_search");

        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, doc.id);
        assert_eq!(back.metadata.url.as_deref(), Some("https://example.com"));
        assert_eq!(back.history.len(), 1);
    }
}
