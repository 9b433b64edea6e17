//! Extractor output and terminal run results.

use super::{Document, RunContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Structured data produced by one extractor stage.
///
/// Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResult {
    /// Identifier of the schema the payload conforms to.
    pub schema_id: String,
    /// The structured payload.
    pub data: serde_json::Value,
    /// Documents that contributed to the result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_document_ids: Vec<Uuid>,
    /// Model or tool that produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When the result was produced.
    pub created_at: DateTime<Utc>,
}

impl StructuredResult {
    /// Creates a new result.
    #[must_use]
    pub fn new(schema_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            schema_id: schema_id.into(),
            data,
            source_document_ids: Vec::new(),
            model: None,
            created_at: Utc::now(),
        }
    }

    /// Records the contributing documents.
    #[must_use]
    pub fn with_sources(mut self, documents: &[Document]) -> Self {
        self.source_document_ids = documents.iter().map(|d| d.id).collect();
        self
    }

    /// Records the producing model or tool.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Record of one stage failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageError {
    /// The stage that failed.
    pub stage: String,
    /// The plugin the stage was bound to.
    pub plugin: String,
    /// The failure message.
    pub message: String,
}

/// Terminal record of one pipeline run.
///
/// Always returned, success or not; on failure it carries whatever
/// documents, results and errors had accumulated before the abort.
#[derive(Debug)]
pub struct PipelineResult {
    /// Whether the run completed without an aborting failure.
    pub success: bool,
    /// The final working document list.
    pub documents: Vec<Document>,
    /// Results accumulated by extractor stages.
    pub structured_results: Vec<StructuredResult>,
    /// The run's context, with final state and usage totals.
    pub context: RunContext,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Per-stage error records, in occurrence order.
    pub errors: Vec<StageError>,
}

impl PipelineResult {
    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.completed_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Number of documents in the final list.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Serializable digest of the run.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.context.run_id(),
            success: self.success,
            document_count: self.document_count(),
            result_count: self.structured_results.len(),
            duration_seconds: self.duration().as_secs_f64(),
            errors: self.errors.clone(),
            tokens_used: self.context.tokens_used(),
            cost_usd: self.context.cost_usd(),
        }
    }
}

/// Flat, serializable digest of a `PipelineResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// The run identifier.
    pub run_id: Uuid,
    /// Whether the run succeeded.
    pub success: bool,
    /// Final document count.
    pub document_count: usize,
    /// Structured result count.
    pub result_count: usize,
    /// Run duration in seconds.
    pub duration_seconds: f64,
    /// Per-stage errors.
    pub errors: Vec<StageError>,
    /// Total tokens consumed.
    pub tokens_used: u64,
    /// Total cost in USD.
    pub cost_usd: f64,
}
