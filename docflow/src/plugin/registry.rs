//! Name-indexed plugin lookup.

use super::{ExtractorPlugin, ProcessorPlugin, SourcePlugin};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of plugins, keyed by name within each capability.
///
/// A lookup miss is an explicit `None`; the engine maps it to a
/// plugin-not-found error at execution time, so pipelines can be wired
/// before every plugin is registered.
#[derive(Default)]
pub struct PluginRegistry {
    sources: RwLock<HashMap<String, Arc<dyn SourcePlugin>>>,
    processors: RwLock<HashMap<String, Arc<dyn ProcessorPlugin>>>,
    extractors: RwLock<HashMap<String, Arc<dyn ExtractorPlugin>>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source plugin under its own name.
    pub fn register_source(&self, plugin: Arc<dyn SourcePlugin>) {
        self.sources
            .write()
            .insert(plugin.name().to_string(), plugin);
    }

    /// Registers a processor plugin under its own name.
    pub fn register_processor(&self, plugin: Arc<dyn ProcessorPlugin>) {
        self.processors
            .write()
            .insert(plugin.name().to_string(), plugin);
    }

    /// Registers an extractor plugin under its own name.
    pub fn register_extractor(&self, plugin: Arc<dyn ExtractorPlugin>) {
        self.extractors
            .write()
            .insert(plugin.name().to_string(), plugin);
    }

    /// Looks up a source plugin.
    #[must_use]
    pub fn get_source(&self, name: &str) -> Option<Arc<dyn SourcePlugin>> {
        self.sources.read().get(name).cloned()
    }

    /// Looks up a processor plugin.
    #[must_use]
    pub fn get_processor(&self, name: &str) -> Option<Arc<dyn ProcessorPlugin>> {
        self.processors.read().get(name).cloned()
    }

    /// Looks up an extractor plugin.
    #[must_use]
    pub fn get_extractor(&self, name: &str) -> Option<Arc<dyn ExtractorPlugin>> {
        self.extractors.read().get(name).cloned()
    }

    /// Registered source names, sorted.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.sources.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered processor names, sorted.
    #[must_use]
    pub fn processor_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.processors.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered extractor names, sorted.
    #[must_use]
    pub fn extractor_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.extractors.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Total number of registered plugins across all capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.read().len() + self.processors.read().len() + self.extractors.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("sources", &self.source_names())
            .field("processors", &self.processor_names())
            .field("extractors", &self.extractor_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MarkerProcessor, StaticSource};

    #[test]
    fn test_register_and_lookup() {
        let registry = PluginRegistry::new();
        assert!(registry.is_empty());

        registry.register_source(Arc::new(StaticSource::new("mock_source", Vec::new())));
        registry.register_processor(Arc::new(MarkerProcessor::new("marker", " [ok]")));

        assert_eq!(registry.len(), 2);
        assert!(registry.get_source("mock_source").is_some());
        assert!(registry.get_processor("marker").is_some());
        assert!(registry.get_source("missing").is_none());
        assert!(registry.get_extractor("mock_source").is_none());
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = PluginRegistry::new();
        registry.register_source(Arc::new(StaticSource::new("zeta", Vec::new())));
        registry.register_source(Arc::new(StaticSource::new("alpha", Vec::new())));

        assert_eq!(registry.source_names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = PluginRegistry::new();
        registry.register_source(Arc::new(StaticSource::new("s", Vec::new())));
        registry.register_source(Arc::new(StaticSource::new("s", Vec::new())));
        assert_eq!(registry.len(), 1);
    }
}
