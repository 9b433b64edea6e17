//! Declarative pipeline construction.
//!
//! Pipelines can be wired from a serializable stage list or from one of
//! the named presets covering common task shapes.

use super::engine::Pipeline;
use super::stage::StageSpec;
use crate::config::ConfigMap;
use crate::errors::ConfigError;
use crate::plugin::{PluginKind, PluginRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A serializable pipeline description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Stage definitions, in execution order.
    #[serde(default)]
    pub stages: Vec<StageDef>,
    /// Pipeline-level configuration.
    #[serde(default)]
    pub config: ConfigMap,
}

/// One stage in a [`PipelineSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    /// The stage type: `source`, `processor` or `extractor`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The plugin to invoke.
    pub plugin: String,
    /// Optional stage name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stage-level configuration.
    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub config: ConfigMap,
    /// Retry budget.
    #[serde(default)]
    pub max_retries: u32,
    /// Whether a failure of this stage is tolerated.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Per-attempt timeout, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
}

impl StageDef {
    /// Creates a definition with defaults.
    #[must_use]
    pub fn new(kind: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            plugin: plugin.into(),
            name: None,
            config: ConfigMap::new(),
            max_retries: 0,
            continue_on_error: false,
            timeout_seconds: None,
        }
    }

    fn into_stage(self) -> Result<StageSpec, ConfigError> {
        let kind = match self.kind.as_str() {
            "source" => PluginKind::Source,
            "processor" => PluginKind::Processor,
            "extractor" => PluginKind::Extractor,
            other => return Err(ConfigError::UnknownStageType(other.to_string())),
        };
        if self.plugin.is_empty() {
            return Err(ConfigError::InvalidStage("empty plugin name".to_string()));
        }

        let mut stage = StageSpec::new(kind, self.plugin)
            .with_config(self.config)
            .with_max_retries(self.max_retries);
        if let Some(name) = self.name {
            stage = stage.with_name(name);
        }
        if let Some(seconds) = self.timeout_seconds {
            stage = stage.with_timeout(Duration::from_secs_f64(seconds));
        }
        if self.continue_on_error {
            stage = stage.continue_on_error();
        }
        Ok(stage)
    }
}

impl Pipeline {
    /// Builds a pipeline from a declarative specification.
    pub fn from_spec(
        spec: PipelineSpec,
        registry: Arc<PluginRegistry>,
    ) -> Result<Self, ConfigError> {
        let mut pipeline = Self::new(registry).with_config(spec.config);
        for def in spec.stages {
            pipeline = pipeline.add_stage(def.into_stage()?);
        }
        Ok(pipeline)
    }

    /// Builds a pipeline from a named preset.
    ///
    /// Available presets: `news_analyst` (fetch and analyze news),
    /// `research_assistant` (fetch and summarize papers), `web_scraper`
    /// (general fetching and cleaning).
    pub fn from_preset(
        preset: &str,
        registry: Arc<PluginRegistry>,
    ) -> Result<Self, ConfigError> {
        let spec = preset_spec(preset).ok_or_else(|| ConfigError::UnknownPreset {
            name: preset.to_string(),
            available: preset_names().iter().map(ToString::to_string).collect(),
        })?;
        Self::from_spec(spec, registry)
    }
}

/// Names of the built-in presets.
#[must_use]
pub fn preset_names() -> &'static [&'static str] {
    &["news_analyst", "research_assistant", "web_scraper"]
}

fn preset_spec(name: &str) -> Option<PipelineSpec> {
    let stages = match name {
        "news_analyst" => vec![
            StageDef::new("source", "news_search"),
            StageDef::new("processor", "html_cleaner"),
            StageDef::new("processor", "chunker"),
            StageDef::new("extractor", "news_extractor"),
        ],
        "research_assistant" => vec![
            StageDef::new("source", "semantic_scholar"),
            StageDef::new("processor", "pdf_extractor"),
            StageDef::new("processor", "chunker"),
            StageDef::new("extractor", "paper_summarizer"),
        ],
        "web_scraper" => vec![
            StageDef::new("source", "web_search"),
            StageDef::new("processor", "html_cleaner"),
        ],
        _ => return None,
    };
    Some(PipelineSpec {
        stages,
        config: ConfigMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> Arc<PluginRegistry> {
        Arc::new(PluginRegistry::new())
    }

    #[test]
    fn test_from_spec_builds_stages_in_order() {
        let spec: PipelineSpec = serde_json::from_value(json!({
            "stages": [
                {"type": "source", "plugin": "news_api", "config": {"api_key": "k"}},
                {"type": "processor", "plugin": "html_cleaner"},
                {"type": "extractor", "plugin": "news_extractor", "name": "headline_pull"}
            ]
        }))
        .unwrap();

        let pipeline = Pipeline::from_spec(spec, registry()).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec!["source_news_api", "process_html_cleaner", "headline_pull"]
        );
    }

    #[test]
    fn test_from_spec_rejects_unknown_type() {
        let spec: PipelineSpec = serde_json::from_value(json!({
            "stages": [{"type": "sink", "plugin": "s3"}]
        }))
        .unwrap();

        let err = Pipeline::from_spec(spec, registry()).unwrap_err();
        assert_eq!(err, ConfigError::UnknownStageType("sink".to_string()));
    }

    #[test]
    fn test_from_spec_carries_execution_controls() {
        let spec: PipelineSpec = serde_json::from_value(json!({
            "stages": [{
                "type": "processor",
                "plugin": "flaky",
                "max_retries": 3,
                "continue_on_error": true,
                "timeout_seconds": 1.5
            }]
        }))
        .unwrap();

        let pipeline = Pipeline::from_spec(spec, registry()).unwrap();
        assert_eq!(pipeline.stage_count(), 1);
    }

    #[test]
    fn test_presets_build() {
        for name in preset_names() {
            let pipeline = Pipeline::from_preset(name, registry()).unwrap();
            assert!(pipeline.stage_count() >= 2, "preset {name} too small");
        }
    }

    #[test]
    fn test_news_analyst_preset_shape() {
        let pipeline = Pipeline::from_preset("news_analyst", registry()).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "source_news_search",
                "process_html_cleaner",
                "process_chunker",
                "extract_news_extractor"
            ]
        );
    }

    #[test]
    fn test_unknown_preset_lists_available() {
        let err = Pipeline::from_preset("nope", registry()).unwrap_err();
        match err {
            ConfigError::UnknownPreset { name, available } => {
                assert_eq!(name, "nope");
                assert_eq!(available.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stage_def_serde_round_trip() {
        let def = StageDef::new("source", "rss");
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["type"], "source");

        let back: StageDef = serde_json::from_value(json).unwrap();
        assert_eq!(back.plugin, "rss");
    }
}
