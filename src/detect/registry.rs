use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;
use super::backends::HerdBackend;

type BackendFactory = dyn Fn() -> Result<Box<dyn DetectorBackend>> + Send + Sync;

/// Thread-safe registry of detector backends.
///
/// Each stream task gets its own backend instance so tracker state never leaks between
/// connections or sessions. Factories may capture shared, internally synchronized
/// resources (e.g. a loaded model) and hand them to every instance they build.
#[derive(Default)]
pub struct BackendRegistry {
    factories: HashMap<String, Arc<BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in backends.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(HerdBackend::NAME, || {
            Ok(Box::new(HerdBackend::new()) as Box<dyn DetectorBackend>)
        });
        registry
    }

    /// Register a backend factory, replacing any previous one of the same name.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<Box<dyn DetectorBackend>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build a fresh backend instance by name.
    pub fn create(&self, name: &str) -> Result<Box<dyn DetectorBackend>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))?;
        factory()
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}
