//! Core domain model types.
//!
//! This module contains the data that flows through the engine:
//! - Documents and their metadata, status and processing history
//! - The mutable per-run context
//! - Extractor results and the terminal run result

mod context;
mod document;
mod result;

pub use context::RunContext;
pub use document::{Document, DocumentMetadata, DocumentStatus, DocumentType, ProcessingStep};
pub use result::{PipelineResult, RunSummary, StageError, StructuredResult};
