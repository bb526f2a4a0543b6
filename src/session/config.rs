use std::sync::{Arc, PoisonError, RwLock};

use crate::count::{CountPolicy, InclusionRegion};
use crate::ingest::SourceSpec;

/// Per-connection session configuration.
///
/// Values are immutable once published; changes build a new value and swap it in.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Source of the current (or last) session; `None` before the first start.
    pub source: Option<SourceSpec>,
    pub region: InclusionRegion,
    /// When false, frames are streamed without running the detector.
    pub detect: bool,
    pub policy: CountPolicy,
}

impl SessionConfig {
    pub fn new(policy: CountPolicy) -> Self {
        Self {
            source: None,
            region: InclusionRegion::WholeFrame,
            detect: true,
            policy,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(CountPolicy::default())
    }
}

/// Synchronized handle to the current `SessionConfig`.
///
/// The control loop writes, the stream task reads once per frame. Readers always see
/// a complete value, either the one before a swap or the one after.
#[derive(Clone, Debug, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<SessionConfig>>>,
}

impl SharedConfig {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The config in force right now.
    pub fn snapshot(&self) -> Arc<SessionConfig> {
        // The guarded value is only ever replaced whole, so a poisoned lock still holds
        // a consistent config.
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: SessionConfig) -> Arc<SessionConfig> {
        let next = Arc::new(config);
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        next
    }

    /// Build the next config from the current one and publish it, under one write lock.
    pub fn update<F>(&self, f: F) -> Arc<SessionConfig>
    where
        F: FnOnce(&SessionConfig) -> SessionConfig,
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(f(&**guard));
        *guard = next.clone();
        next
    }
}
