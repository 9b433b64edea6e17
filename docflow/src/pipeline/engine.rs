//! The pipeline engine.
//!
//! Coordinates the flow of documents through source, processor and
//! extractor stages, in declaration order, with per-stage retries,
//! lifecycle hooks and optional checkpointing.

use super::hooks::{HookEvent, HookPayload, HookRegistry};
use super::retry::{retry_with_policy, BackoffPolicy};
use super::stage::StageSpec;
use crate::checkpoint::{CheckpointStore, RunCheckpoint};
use crate::config::{ConfigLayers, ConfigMap};
use crate::errors::DocflowError;
use crate::plugin::{PluginKind, PluginRegistry};
use crate::schema::{
    Document, DocumentStatus, PipelineResult, RunContext, StageError, StructuredResult,
};
use chrono::Utc;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Per-call options for [`Pipeline::run_with`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Output directory recorded on the run context.
    pub output_dir: Option<PathBuf>,
    /// Call-level configuration; overrides stage- and pipeline-level keys.
    pub call_config: ConfigMap,
    /// Mark the run as a dry run.
    pub dry_run: bool,
    /// Enable debug mode on the run context.
    pub debug: bool,
    /// Resume the run with this identifier from its checkpoint.
    pub resume: Option<Uuid>,
}

impl RunOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Sets the call-level configuration.
    #[must_use]
    pub fn with_call_config(mut self, config: ConfigMap) -> Self {
        self.call_config = config;
        self
    }

    /// Marks the run as a dry run.
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Resumes from the checkpoint of a previous run.
    #[must_use]
    pub fn resume_from(mut self, run_id: Uuid) -> Self {
        self.resume = Some(run_id);
        self
    }
}

/// What a successful stage produced.
enum StageOutcome {
    /// A new working document list (source and processor stages).
    Documents(Vec<Document>),
    /// One structured result (extractor stages).
    Extracted(StructuredResult),
    /// Nothing; the stage was a no-op.
    Nothing,
}

/// The pipeline engine.
///
/// Stages execute strictly one after another; a stage's plugin call is
/// awaited to completion before the next stage starts. A run always ends
/// in a terminal [`PipelineResult`], never an error.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::new(registry)
///     .add_source("news_search")
///     .add_processor("html_cleaner")
///     .add_extractor("news_extractor");
///
/// let result = pipeline.run("Latest ecology news", 10).await;
/// ```
pub struct Pipeline {
    registry: Arc<PluginRegistry>,
    config: ConfigMap,
    backoff: BackoffPolicy,
    stages: Vec<StageSpec>,
    hooks: HookRegistry,
    checkpoints: Option<CheckpointStore>,
}

impl Pipeline {
    /// Creates an empty pipeline over a plugin registry.
    #[must_use]
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            config: ConfigMap::new(),
            backoff: BackoffPolicy::default(),
            stages: Vec::new(),
            hooks: HookRegistry::new(),
            checkpoints: None,
        }
    }

    /// Sets the pipeline-level configuration.
    #[must_use]
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    /// Overrides the backoff policy used between retry attempts.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Attaches a checkpoint store.
    ///
    /// Progress is saved after every successful stage, restored by
    /// [`RunOptions::resume_from`], and cleared after a successful run.
    #[must_use]
    pub fn with_checkpoint_store(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Appends a source stage with default settings.
    #[must_use]
    pub fn add_source(self, plugin: impl Into<String>) -> Self {
        self.add_stage(StageSpec::source(plugin))
    }

    /// Appends a processor stage with default settings.
    #[must_use]
    pub fn add_processor(self, plugin: impl Into<String>) -> Self {
        self.add_stage(StageSpec::processor(plugin))
    }

    /// Appends an extractor stage with default settings.
    #[must_use]
    pub fn add_extractor(self, plugin: impl Into<String>) -> Self {
        self.add_stage(StageSpec::extractor(plugin))
    }

    /// Appends a fully configured stage.
    ///
    /// Plugin existence is deliberately not checked here; registries may
    /// be populated after wiring, so lookup misses surface at execution
    /// time instead.
    #[must_use]
    pub fn add_stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    /// Registers a lifecycle hook callback.
    #[must_use]
    pub fn add_hook<F>(mut self, event: HookEvent, callback: F) -> Self
    where
        F: Fn(&HookPayload<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.register(event, Arc::new(callback));
        self
    }

    /// Number of declared stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Declared stage names, in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(StageSpec::name).collect()
    }

    /// Executes the pipeline with default options.
    pub async fn run(&self, task: &str, limit: usize) -> PipelineResult {
        self.run_with(task, limit, RunOptions::default()).await
    }

    /// Executes the pipeline.
    ///
    /// Stages run in declaration order against a fresh [`RunContext`].
    /// Failures are retried within each stage's budget; an exhausted
    /// failure either aborts the run or, for `continue_on_error` stages,
    /// is recorded while execution continues. The returned result carries
    /// whatever documents, structured results and errors accumulated.
    pub async fn run_with(&self, task: &str, limit: usize, options: RunOptions) -> PipelineResult {
        let started_at = Utc::now();

        let mut context = RunContext::new(task)
            .with_config(self.config.clone())
            .with_debug(options.debug)
            .with_dry_run(options.dry_run);
        if let Some(dir) = &options.output_dir {
            context = context.with_output_dir(dir);
        }
        if let Some(run_id) = options.resume {
            context = context.with_run_id(run_id);
        }

        let mut documents: Vec<Document> = Vec::new();
        let mut structured_results: Vec<StructuredResult> = Vec::new();
        let mut errors: Vec<StageError> = Vec::new();
        let mut completed_stages: Vec<String> = Vec::new();

        if let (Some(store), Some(run_id)) = (&self.checkpoints, options.resume) {
            if let Some(checkpoint) = store.load::<RunCheckpoint>(run_id).await {
                tracing::info!(
                    run_id = %run_id,
                    completed = checkpoint.completed_stages.len(),
                    "Resuming run from checkpoint"
                );
                documents = checkpoint.documents;
                structured_results = checkpoint.structured_results;
                completed_stages = checkpoint.completed_stages;
            }
        }

        self.hooks.dispatch(&HookPayload {
            event: HookEvent::BeforeRun,
            context: &context,
            stage: None,
            error: None,
        });

        let mut aborted = false;

        for stage in &self.stages {
            if completed_stages.iter().any(|name| name == stage.name()) {
                tracing::info!(stage = %stage.name(), "Skipping stage (already completed)");
                continue;
            }
            if !stage.should_run(&context, &documents) {
                tracing::info!(
                    stage = %stage.name(),
                    "Skipping stage (condition not met or disabled)"
                );
                continue;
            }

            context.set_current_stage(stage.name());
            self.hooks.dispatch(&HookPayload {
                event: HookEvent::BeforeStage,
                context: &context,
                stage: Some(stage),
                error: None,
            });

            let attempts = stage.max_retries().saturating_add(1);
            let context_ref = &context;
            let documents_ref = documents.as_slice();
            let call_config = &options.call_config;
            let outcome = retry_with_policy(&self.backoff, attempts, move || {
                self.run_stage_once(stage, task, limit, context_ref, documents_ref, call_config)
            })
            .await;

            match outcome {
                Ok(StageOutcome::Documents(next)) => {
                    documents = next;
                }
                Ok(StageOutcome::Extracted(result)) => {
                    structured_results.push(result);
                }
                Ok(StageOutcome::Nothing) => {}
                Err(error) => {
                    let record = StageError {
                        stage: stage.name().to_string(),
                        plugin: stage.plugin().to_string(),
                        message: error.to_string(),
                    };
                    errors.push(record.clone());
                    self.hooks.dispatch(&HookPayload {
                        event: HookEvent::OnError,
                        context: &context,
                        stage: Some(stage),
                        error: Some(&record),
                    });

                    if stage.continues_on_error() {
                        tracing::warn!(
                            stage = %stage.name(),
                            error = %error,
                            "Stage failed, continuing"
                        );
                        continue;
                    }

                    tracing::error!(stage = %stage.name(), error = %error, "Pipeline aborted");
                    aborted = true;
                    break;
                }
            }

            self.hooks.dispatch(&HookPayload {
                event: HookEvent::AfterStage,
                context: &context,
                stage: Some(stage),
                error: None,
            });
            completed_stages.push(stage.name().to_string());

            if let Some(store) = &self.checkpoints {
                let checkpoint = RunCheckpoint::new(
                    context.run_id(),
                    task,
                    completed_stages.clone(),
                    documents.clone(),
                    structured_results.clone(),
                );
                store.save(context.run_id(), &checkpoint).await;
            }
        }

        if !aborted {
            self.hooks.dispatch(&HookPayload {
                event: HookEvent::AfterRun,
                context: &context,
                stage: None,
                error: None,
            });
            if let Some(store) = &self.checkpoints {
                store.clear(context.run_id()).await;
            }
        }

        PipelineResult {
            success: !aborted,
            documents,
            structured_results,
            context,
            started_at,
            completed_at: Utc::now(),
            errors,
        }
    }

    /// Runs one stage attempt, honoring the stage timeout.
    async fn run_stage_once(
        &self,
        stage: &StageSpec,
        task: &str,
        limit: usize,
        context: &RunContext,
        documents: &[Document],
        call_config: &ConfigMap,
    ) -> Result<StageOutcome, DocflowError> {
        let config = ConfigLayers::new(
            self.config.clone(),
            stage.config().clone(),
            call_config.clone(),
        )
        .merged();

        let body = self.dispatch_stage(stage, task, limit, context, documents, &config);
        match stage.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, body)
                .await
                .map_err(|_| DocflowError::stage_timeout(stage.name(), timeout))?,
            None => body.await,
        }
    }

    async fn dispatch_stage(
        &self,
        stage: &StageSpec,
        task: &str,
        limit: usize,
        context: &RunContext,
        documents: &[Document],
        config: &ConfigMap,
    ) -> Result<StageOutcome, DocflowError> {
        match stage.kind() {
            PluginKind::Source => self.run_source_stage(stage, task, limit, context, config).await,
            PluginKind::Processor => {
                self.run_processor_stage(stage, context, documents, config).await
            }
            PluginKind::Extractor => {
                self.run_extractor_stage(stage, context, documents, config).await
            }
        }
    }

    async fn run_source_stage(
        &self,
        stage: &StageSpec,
        task: &str,
        limit: usize,
        context: &RunContext,
        config: &ConfigMap,
    ) -> Result<StageOutcome, DocflowError> {
        let plugin = self
            .registry
            .get_source(stage.plugin())
            .ok_or_else(|| DocflowError::plugin_not_found(PluginKind::Source, stage.plugin()))?;

        plugin.initialize(context).await?;

        let mut stream = plugin.fetch(task, limit, context, config).await?;
        let mut fetched = Vec::new();
        while let Some(item) = stream.next().await {
            let mut document = item?;
            document.status = DocumentStatus::Completed;
            document.add_processing_step_with(
                stage.plugin(),
                [("stage".to_string(), serde_json::json!(stage.name()))]
                    .into_iter()
                    .collect(),
            );
            fetched.push(document);
            if fetched.len() >= limit {
                break;
            }
        }

        tracing::info!(
            plugin = %stage.plugin(),
            count = fetched.len(),
            "Source fetched documents"
        );
        Ok(StageOutcome::Documents(fetched))
    }

    async fn run_processor_stage(
        &self,
        stage: &StageSpec,
        context: &RunContext,
        documents: &[Document],
        config: &ConfigMap,
    ) -> Result<StageOutcome, DocflowError> {
        let plugin = self
            .registry
            .get_processor(stage.plugin())
            .ok_or_else(|| DocflowError::plugin_not_found(PluginKind::Processor, stage.plugin()))?;

        plugin.initialize(context).await?;

        let input_count = documents.len();
        let processed = plugin.process_batch(documents.to_vec(), context, config).await?;

        tracing::info!(
            plugin = %stage.plugin(),
            input = input_count,
            output = processed.len(),
            "Processor transformed documents"
        );
        Ok(StageOutcome::Documents(processed))
    }

    async fn run_extractor_stage(
        &self,
        stage: &StageSpec,
        context: &RunContext,
        documents: &[Document],
        config: &ConfigMap,
    ) -> Result<StageOutcome, DocflowError> {
        let plugin = self
            .registry
            .get_extractor(stage.plugin())
            .ok_or_else(|| DocflowError::plugin_not_found(PluginKind::Extractor, stage.plugin()))?;

        if documents.is_empty() {
            tracing::warn!(stage = %stage.name(), "No documents to extract from");
            return Ok(StageOutcome::Nothing);
        }

        plugin.initialize(context).await?;

        let result = plugin.extract(documents, context, config).await?;
        tracing::info!(
            plugin = %stage.plugin(),
            schema_id = %result.schema_id,
            "Extractor produced result"
        );
        Ok(StageOutcome::Extracted(result))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("config", &self.config)
            .field("checkpoints", &self.checkpoints.is_some())
            .finish()
    }
}
