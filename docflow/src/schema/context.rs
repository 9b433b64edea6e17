//! The mutable context for a single pipeline run.

use crate::config::ConfigMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// State scoped to one pipeline execution.
///
/// Owned by a single `run` invocation and shared by reference with plugins
/// and hooks. The key-value store and usage totals use interior mutability
/// so that plugins can write through a shared reference; writes from
/// plugin-internal worker tasks must go through these accessors.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    task: String,
    config: ConfigMap,
    output_dir: Option<PathBuf>,
    debug: bool,
    dry_run: bool,
    current_stage: RwLock<Option<String>>,
    state: RwLock<HashMap<String, serde_json::Value>>,
    tokens_used: AtomicU64,
    cost_usd: RwLock<f64>,
}

impl RunContext {
    /// Creates a fresh context for a task.
    #[must_use]
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task: task.into(),
            config: ConfigMap::new(),
            output_dir: None,
            debug: false,
            dry_run: false,
            current_stage: RwLock::new(None),
            state: RwLock::new(HashMap::new()),
            tokens_used: AtomicU64::new(0),
            cost_usd: RwLock::new(0.0),
        }
    }

    /// Overrides the run identifier (used when resuming a prior run).
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Sets the pipeline-level configuration.
    #[must_use]
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Enables debug mode.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enables dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Returns the run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the originating task string.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Returns the pipeline-level configuration.
    #[must_use]
    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// Returns the output directory, if configured.
    #[must_use]
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Returns true when debug mode is on.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Returns true when the run is a dry run.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Records the stage currently executing.
    pub fn set_current_stage(&self, stage: impl Into<String>) {
        *self.current_stage.write() = Some(stage.into());
    }

    /// Returns the stage currently executing, if any.
    #[must_use]
    pub fn current_stage(&self) -> Option<String> {
        self.current_stage.read().clone()
    }

    /// Reads a value from the run state store.
    #[must_use]
    pub fn get_state(&self, key: &str) -> Option<serde_json::Value> {
        self.state.read().get(key).cloned()
    }

    /// Writes a value into the run state store.
    pub fn set_state(&self, key: impl Into<String>, value: serde_json::Value) {
        self.state.write().insert(key.into(), value);
    }

    /// Snapshot of the whole state store.
    #[must_use]
    pub fn state(&self) -> HashMap<String, serde_json::Value> {
        self.state.read().clone()
    }

    /// Accumulates LLM usage onto the running totals.
    pub fn add_usage(&self, tokens: u64, cost_usd: f64) {
        self.tokens_used.fetch_add(tokens, Ordering::Relaxed);
        *self.cost_usd.write() += cost_usd;
    }

    /// Total tokens consumed so far.
    #[must_use]
    pub fn tokens_used(&self) -> u64 {
        self.tokens_used.load(Ordering::Relaxed)
    }

    /// Total cost accumulated so far, in USD.
    #[must_use]
    pub fn cost_usd(&self) -> f64 {
        *self.cost_usd.read()
    }
}
