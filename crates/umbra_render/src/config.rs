//! Render configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a render configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid render config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Render configuration.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Worker threads besides the calling one. `None` uses one per core.
    pub threads: Option<usize>,
    /// How many strips each thread gets on average
    pub strips_per_thread: usize,
    /// Minimum time between two progress reports
    pub progress_interval_ms: u64,
    /// Base seed of the per-strip sampler seeds
    pub seed: u64,
    /// Samples per pixel
    pub samples: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            threads: None,
            strips_per_thread: 6,
            progress_interval_ms: 250,
            seed: 0,
            samples: 4,
        }
    }
}

impl RenderConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_strips_per_thread(mut self, strips: usize) -> Self {
        self.strips_per_thread = strips;
        self
    }

    pub fn with_progress_interval(mut self, millis: u64) -> Self {
        self.progress_interval_ms = millis;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Size of the worker pool.
    pub fn thread_count(&self) -> usize {
        self.threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Number of strips for a pool of `threads` workers: never more than
    /// there are rows, never less than one.
    pub fn strip_count(&self, threads: usize) -> usize {
        (self.strips_per_thread.max(1) * threads)
            .min(self.height as usize)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.strips_per_thread, 6);
        assert_eq!(config.progress_interval_ms, 250);
        assert!(config.threads.is_none());
        assert!(config.thread_count() >= 1);
    }

    #[test]
    fn test_config_partial_json() {
        let config =
            RenderConfig::from_json_str(r#"{ "width": 32, "height": 8, "threads": 2 }"#).unwrap();
        assert_eq!(config.width, 32);
        assert_eq!(config.height, 8);
        assert_eq!(config.thread_count(), 2);
        assert_eq!(config.samples, RenderConfig::default().samples);
    }

    #[test]
    fn test_config_rejects_bad_json() {
        let err = RenderConfig::from_json_str(r#"{ "width": "wide" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));

        let err = RenderConfig::load("/nonexistent/umbra.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_strip_count() {
        let config = RenderConfig::default().with_resolution(100, 10);
        assert_eq!(config.strip_count(1), 6);
        // Capped by the row count.
        assert_eq!(config.strip_count(4), 10);
        let flat = RenderConfig::default().with_resolution(100, 0);
        assert_eq!(flat.strip_count(4), 1);
    }
}
