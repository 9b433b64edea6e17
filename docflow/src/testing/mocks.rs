//! Mock plugins backed by in-memory data and call counters.

use crate::config::ConfigMap;
use crate::errors::DocflowError;
use crate::plugin::{
    DocumentStream, ExtractorPlugin, ProcessorPlugin, SourcePlugin,
};
use crate::schema::{Document, RunContext, StructuredResult};
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Builds `count` plain-text documents with predictable contents.
#[must_use]
pub fn sample_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|n| Document::text(format!("document {n}")))
        .collect()
}

/// A source that yields a fixed document list.
#[derive(Debug)]
pub struct StaticSource {
    name: String,
    documents: Vec<Document>,
    fetch_calls: AtomicUsize,
}

impl StaticSource {
    /// Creates a source yielding clones of `documents`.
    #[must_use]
    pub fn new(name: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            documents,
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `fetch` was called.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourcePlugin for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        _task: &str,
        limit: usize,
        _context: &RunContext,
        _config: &ConfigMap,
    ) -> Result<DocumentStream, DocflowError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let documents: Vec<_> = self.documents.iter().take(limit).cloned().collect();
        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }
}

/// A processor that appends a marker to each document's content.
#[derive(Debug)]
pub struct MarkerProcessor {
    name: String,
    marker: String,
    calls: AtomicUsize,
}

impl MarkerProcessor {
    /// Creates a marker processor.
    #[must_use]
    pub fn new(name: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            marker: marker.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `process_batch` was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessorPlugin for MarkerProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_batch(
        &self,
        mut documents: Vec<Document>,
        _context: &RunContext,
        _config: &ConfigMap,
    ) -> Result<Vec<Document>, DocflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for document in &mut documents {
            document.content.push_str(&self.marker);
            document.add_processing_step(&self.name);
        }
        Ok(documents)
    }
}

/// A processor that always fails.
#[derive(Debug)]
pub struct FailingProcessor {
    name: String,
    calls: AtomicUsize,
}

impl FailingProcessor {
    /// Creates a failing processor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `process_batch` was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessorPlugin for FailingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_batch(
        &self,
        _documents: Vec<Document>,
        _context: &RunContext,
        _config: &ConfigMap,
    ) -> Result<Vec<Document>, DocflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DocflowError::stage_execution(&self.name, "always fails"))
    }
}

/// A processor that fails a fixed number of times, then succeeds.
#[derive(Debug)]
pub struct FlakyProcessor {
    name: String,
    failures_remaining: AtomicU32,
    calls: AtomicUsize,
}

impl FlakyProcessor {
    /// Creates a processor that fails its first `failures` calls.
    #[must_use]
    pub fn new(name: impl Into<String>, failures: u32) -> Self {
        Self {
            name: name.into(),
            failures_remaining: AtomicU32::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `process_batch` was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessorPlugin for FlakyProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_batch(
        &self,
        documents: Vec<Document>,
        _context: &RunContext,
        _config: &ConfigMap,
    ) -> Result<Vec<Document>, DocflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(DocflowError::stage_execution(
                &self.name,
                format!("transient failure ({remaining} left)"),
            ));
        }
        Ok(documents)
    }
}

/// A processor that sleeps before returning its input unchanged.
#[derive(Debug)]
pub struct SlowProcessor {
    name: String,
    delay: std::time::Duration,
}

impl SlowProcessor {
    /// Creates a processor sleeping for `delay` per batch.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: std::time::Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl ProcessorPlugin for SlowProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_batch(
        &self,
        documents: Vec<Document>,
        _context: &RunContext,
        _config: &ConfigMap,
    ) -> Result<Vec<Document>, DocflowError> {
        tokio::time::sleep(self.delay).await;
        Ok(documents)
    }
}

/// An extractor that counts its input documents.
#[derive(Debug)]
pub struct CountExtractor {
    name: String,
    calls: AtomicUsize,
}

impl CountExtractor {
    /// Creates a counting extractor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `extract` was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractorPlugin for CountExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(
        &self,
        documents: &[Document],
        _context: &RunContext,
        _config: &ConfigMap,
    ) -> Result<StructuredResult, DocflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(
            StructuredResult::new("document_count", serde_json::json!({"count": documents.len()}))
                .with_sources(documents)
                .with_model(&self.name),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_static_source_respects_limit() {
        let source = StaticSource::new("s", sample_documents(5));
        let context = RunContext::new("task");
        let config = ConfigMap::new();

        let stream = source.fetch("task", 2, &context, &config).await.unwrap();
        let fetched: Vec<_> = stream.collect().await;

        assert_eq!(fetched.len(), 2);
        assert_eq!(source.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_flaky_processor_recovers() {
        let processor = FlakyProcessor::new("flaky", 2);
        let context = RunContext::new("task");
        let config = ConfigMap::new();

        assert!(processor
            .process_batch(Vec::new(), &context, &config)
            .await
            .is_err());
        assert!(processor
            .process_batch(Vec::new(), &context, &config)
            .await
            .is_err());
        assert!(processor
            .process_batch(Vec::new(), &context, &config)
            .await
            .is_ok());
        assert_eq!(processor.calls(), 3);
    }

    #[tokio::test]
    async fn test_count_extractor_lineage() {
        let extractor = CountExtractor::new("counter");
        let context = RunContext::new("task");
        let config = ConfigMap::new();
        let documents = sample_documents(3);

        let result = extractor
            .extract(&documents, &context, &config)
            .await
            .unwrap();

        assert_eq!(result.schema_id, "document_count");
        assert_eq!(result.data["count"], serde_json::json!(3));
        assert_eq!(result.source_document_ids.len(), 3);
    }
}
