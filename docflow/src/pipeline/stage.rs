//! Stage descriptors.

use crate::config::ConfigMap;
use crate::plugin::PluginKind;
use crate::schema::{Document, RunContext};
use std::sync::Arc;
use std::time::Duration;

/// A predicate deciding whether a stage runs, given the context and the
/// current working documents.
pub type StageCondition =
    Arc<dyn Fn(&RunContext, &[Document]) -> anyhow::Result<bool> + Send + Sync>;

/// Declarative description of one unit of pipeline work.
///
/// Immutable once added to a pipeline. The stage name must be unique
/// within its pipeline; it defaults to a kind-prefixed plugin name.
#[derive(Clone)]
pub struct StageSpec {
    name: String,
    plugin: String,
    kind: PluginKind,
    config: ConfigMap,
    enabled: bool,
    continue_on_error: bool,
    max_retries: u32,
    timeout: Option<Duration>,
    condition: Option<StageCondition>,
}

impl StageSpec {
    /// Creates a stage with the default kind-prefixed name.
    #[must_use]
    pub fn new(kind: PluginKind, plugin: impl Into<String>) -> Self {
        let plugin = plugin.into();
        let prefix = match kind {
            PluginKind::Source => "source",
            PluginKind::Processor => "process",
            PluginKind::Extractor => "extract",
        };
        Self {
            name: format!("{prefix}_{plugin}"),
            plugin,
            kind,
            config: ConfigMap::new(),
            enabled: true,
            continue_on_error: false,
            max_retries: 0,
            timeout: None,
            condition: None,
        }
    }

    /// Creates a source stage.
    #[must_use]
    pub fn source(plugin: impl Into<String>) -> Self {
        Self::new(PluginKind::Source, plugin)
    }

    /// Creates a processor stage.
    #[must_use]
    pub fn processor(plugin: impl Into<String>) -> Self {
        Self::new(PluginKind::Processor, plugin)
    }

    /// Creates an extractor stage.
    #[must_use]
    pub fn extractor(plugin: impl Into<String>) -> Self {
        Self::new(PluginKind::Extractor, plugin)
    }

    /// Overrides the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the stage-level configuration.
    #[must_use]
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    /// Sets the retry budget (attempts beyond the first).
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets a per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets a run condition.
    #[must_use]
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&RunContext, &[Document]) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Lets the run continue past a failure of this stage.
    #[must_use]
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    /// Disables the stage.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the plugin name the stage is bound to.
    #[must_use]
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Returns the plugin kind.
    #[must_use]
    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Returns the stage-level configuration.
    #[must_use]
    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// Returns true if the stage is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns true if a failure of this stage is tolerated.
    #[must_use]
    pub fn continues_on_error(&self) -> bool {
        self.continue_on_error
    }

    /// Returns the retry budget.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the per-attempt timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Decides whether the stage should run.
    ///
    /// Fail-closed: a disabled stage never runs, and a condition that
    /// errors is treated as false.
    #[must_use]
    pub fn should_run(&self, context: &RunContext, documents: &[Document]) -> bool {
        if !self.enabled {
            return false;
        }
        match &self.condition {
            Some(condition) => match condition(context, documents) {
                Ok(run) => run,
                Err(error) => {
                    tracing::warn!(
                        stage = %self.name,
                        error = %error,
                        "Condition check failed, stage will not run"
                    );
                    false
                }
            },
            None => true,
        }
    }
}

impl std::fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("continue_on_error", &self.continue_on_error)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("has_condition", &self.condition.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_names_are_kind_prefixed() {
        assert_eq!(StageSpec::source("news_api").name(), "source_news_api");
        assert_eq!(StageSpec::processor("cleaner").name(), "process_cleaner");
        assert_eq!(StageSpec::extractor("summarizer").name(), "extract_summarizer");
    }

    #[test]
    fn test_builder_overrides() {
        let stage = StageSpec::processor("chunker")
            .with_name("split")
            .with_max_retries(2)
            .with_timeout(Duration::from_secs(5))
            .with_config(ConfigMap::new().with_value("chunk_size", json!(512)))
            .continue_on_error();

        assert_eq!(stage.name(), "split");
        assert_eq!(stage.max_retries(), 2);
        assert_eq!(stage.timeout(), Some(Duration::from_secs(5)));
        assert!(stage.continues_on_error());
        assert_eq!(stage.config().get_u64("chunk_size"), Some(512));
    }

    #[test]
    fn test_disabled_stage_never_runs() {
        let stage = StageSpec::source("s").disabled();
        let ctx = RunContext::new("task");
        assert!(!stage.should_run(&ctx, &[]));
    }

    #[test]
    fn test_condition_decides() {
        let stage = StageSpec::processor("p")
            .with_condition(|_ctx, docs| Ok(!docs.is_empty()));
        let ctx = RunContext::new("task");

        assert!(!stage.should_run(&ctx, &[]));
        assert!(stage.should_run(&ctx, &[Document::text("x")]));
    }

    #[test]
    fn test_condition_error_is_fail_closed() {
        let stage = StageSpec::processor("p")
            .with_condition(|_ctx, _docs| anyhow::bail!("predicate broke"));
        let ctx = RunContext::new("task");

        assert!(!stage.should_run(&ctx, &[Document::text("x")]));
    }
}
