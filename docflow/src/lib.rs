//! # Docflow
//!
//! A document acquisition and extraction pipeline engine.
//!
//! Docflow coordinates the flow of documents from sources through
//! processors to extractors, with support for:
//!
//! - **Stage-based execution**: Declarative stages with conditions,
//!   retries and timeouts, executed strictly in order
//! - **Partial-failure tolerance**: Per-stage continue-on-error, with a
//!   terminal result carrying everything that succeeded
//! - **Checkpoint/resume**: Durable progress blobs keyed by run id
//! - **Streaming**: A per-document execution variant with per-item
//!   failure isolation
//! - **Bounded concurrency**: An executor for fanning out document-level
//!   work inside plugins
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docflow::prelude::*;
//!
//! let registry = Arc::new(PluginRegistry::new());
//! // register plugins...
//!
//! let pipeline = Pipeline::new(registry)
//!     .add_source("news_search")
//!     .add_processor("html_cleaner")
//!     .add_extractor("news_extractor");
//!
//! let result = pipeline.run("Latest AI news", 10).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod executor;
pub mod pipeline;
pub mod plugin;
pub mod schema;
pub mod stream;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checkpoint::{CheckpointStore, RunCheckpoint};
    pub use crate::config::{ConfigLayers, ConfigMap};
    pub use crate::errors::{ConfigError, DocflowError};
    pub use crate::executor::{ConcurrentExecutor, ExecutionMode, TaskHandle};
    pub use crate::pipeline::{
        BackoffPolicy, HookEvent, HookPayload, Jitter, Pipeline, PipelineSpec, RunOptions,
        StageDef, StageSpec,
    };
    pub use crate::plugin::{
        DocumentStream, ExtractorPlugin, PluginKind, PluginRegistry, ProcessorPlugin,
        SourcePlugin,
    };
    pub use crate::schema::{
        Document, DocumentMetadata, DocumentStatus, DocumentType, PipelineResult, RunContext,
        StageError, StructuredResult,
    };
    pub use crate::stream::{transform_fn, DocumentTransform, StreamPipeline};
}
