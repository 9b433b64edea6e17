//! Plugin contracts consumed by the pipeline engine.
//!
//! The engine knows exactly three capabilities: sources produce documents,
//! processors transform document batches, extractors distill structured
//! results. Implementations live outside this crate and are looked up by
//! name through the [`PluginRegistry`].

mod registry;

pub use registry::PluginRegistry;

use crate::config::ConfigMap;
use crate::errors::DocflowError;
use crate::schema::{Document, RunContext, StructuredResult};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// The three plugin capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    /// Produces documents for a task.
    Source,
    /// Transforms a batch of documents.
    Processor,
    /// Distills structured results from documents.
    Extractor,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Source => "source",
            Self::Processor => "processor",
            Self::Extractor => "extractor",
        };
        f.write_str(s)
    }
}

/// A lazy, finite sequence of fetched documents.
///
/// Item errors surface per document; the consumer decides whether an error
/// ends the fetch.
pub type DocumentStream = BoxStream<'static, Result<Document, DocflowError>>;

/// A plugin that acquires documents from an external system.
#[async_trait]
pub trait SourcePlugin: Send + Sync {
    /// The name the plugin is registered under.
    fn name(&self) -> &str;

    /// Called once before `fetch`, with the run's context.
    async fn initialize(&self, _context: &RunContext) -> Result<(), DocflowError> {
        Ok(())
    }

    /// Fetches documents for a task.
    ///
    /// The stream is consumed eagerly by the engine, up to `limit` items.
    /// Implementations that page an upstream API should fetch lazily and
    /// stop when the stream is dropped.
    async fn fetch(
        &self,
        task: &str,
        limit: usize,
        context: &RunContext,
        config: &ConfigMap,
    ) -> Result<DocumentStream, DocflowError>;
}

/// A plugin that transforms a batch of documents.
#[async_trait]
pub trait ProcessorPlugin: Send + Sync {
    /// The name the plugin is registered under.
    fn name(&self) -> &str;

    /// Called once before `process_batch`, with the run's context.
    async fn initialize(&self, _context: &RunContext) -> Result<(), DocflowError> {
        Ok(())
    }

    /// Transforms a document batch.
    ///
    /// The output replaces the working list; it may be shorter (filtering)
    /// or longer (expansion, e.g. chunking) than the input.
    async fn process_batch(
        &self,
        documents: Vec<Document>,
        context: &RunContext,
        config: &ConfigMap,
    ) -> Result<Vec<Document>, DocflowError>;
}

/// A plugin that produces one structured result from a document set.
#[async_trait]
pub trait ExtractorPlugin: Send + Sync {
    /// The name the plugin is registered under.
    fn name(&self) -> &str;

    /// Called once before `extract`, with the run's context.
    async fn initialize(&self, _context: &RunContext) -> Result<(), DocflowError> {
        Ok(())
    }

    /// Distills a structured result from the documents.
    ///
    /// Never invoked with an empty slice.
    async fn extract(
        &self,
        documents: &[Document],
        context: &RunContext,
        config: &ConfigMap,
    ) -> Result<StructuredResult, DocflowError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_kind_display() {
        assert_eq!(PluginKind::Source.to_string(), "source");
        assert_eq!(PluginKind::Processor.to_string(), "processor");
        assert_eq!(PluginKind::Extractor.to_string(), "extractor");
    }

    #[test]
    fn test_plugin_kind_serde() {
        let json = serde_json::to_string(&PluginKind::Extractor).unwrap();
        assert_eq!(json, r#""extractor""#);

        let back: PluginKind = serde_json::from_str(r#""source""#).unwrap();
        assert_eq!(back, PluginKind::Source);
    }
}
