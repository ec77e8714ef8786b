//! Settings - tunables of the pipeline and the renderer actor.
//!
//! Every field has a default, so an empty configuration source is valid.
//! The binary layers a config file, `PRESSROOM__*` environment variables and
//! command line flags on top.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actor::RendererPolicy;
use crate::app::{CacheLookup, PipelineConfig};
use crate::queue::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Lifetime of a cached document.
    pub retention_secs: u64,
    pub lookup: CacheLookup,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            retention_secs: 72 * 60 * 60,
            lookup: CacheLookup::Exact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub actor_name: String,
    pub tick_interval_secs: u64,
    pub idle_threshold_secs: u64,
    pub navigation_timeout_secs: u64,
    pub mailbox_capacity: usize,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            actor_name: "rendering_browser".to_string(),
            tick_interval_secs: 10,
            idle_threshold_secs: 600,
            navigation_timeout_secs: 30,
            mailbox_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub renderer: RendererSettings,
    pub retry: RetrySettings,

    /// Pipeline workers.
    pub workers: usize,

    /// File-backed run journal; in-memory when unset.
    pub journal_dir: Option<PathBuf>,

    /// File-backed content cache. Defaults to `<journal_dir>/cache` when a
    /// journal is configured, in-memory otherwise.
    pub cache_dir: Option<PathBuf>,

    pub outbox_dir: PathBuf,
    pub sender: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            renderer: RendererSettings::default(),
            retry: RetrySettings::default(),
            workers: 2,
            journal_dir: None,
            cache_dir: None,
            outbox_dir: PathBuf::from("outbox"),
            sender: "pressroom@localhost".to_string(),
        }
    }
}

impl Settings {
    /// Directory of the file-backed cache, if any.
    pub fn effective_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| self.journal_dir.as_ref().map(|dir| dir.join("cache")))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
            self.retry.multiplier,
        )
    }

    pub fn renderer_policy(&self) -> RendererPolicy {
        RendererPolicy {
            tick_interval: Duration::from_secs(self.renderer.tick_interval_secs),
            idle_threshold: Duration::from_secs(self.renderer.idle_threshold_secs),
            navigation_timeout: Duration::from_secs(self.renderer.navigation_timeout_secs),
            retention: Duration::from_secs(self.cache.retention_secs),
            mailbox_capacity: self.renderer.mailbox_capacity,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            actor_name: self.renderer.actor_name.clone(),
            sender: self.sender.clone(),
            lookup: self.cache.lookup,
        }
    }

    /// Problems that would make the pipeline misbehave, if any.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.workers == 0 {
            problems.push("workers must be at least 1".to_string());
        }
        if self.retry.max_attempts == 0 {
            problems.push("retry.max_attempts must be at least 1".to_string());
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            problems.push("retry.multiplier must be a finite number >= 1".to_string());
        }
        if self.renderer.tick_interval_secs == 0 {
            problems.push("renderer.tick_interval_secs must be positive".to_string());
        }
        if self.renderer.actor_name.is_empty() {
            problems.push("renderer.actor_name must not be empty".to_string());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_timings() {
        let settings = Settings::default();
        let policy = settings.renderer_policy();
        assert_eq!(policy.tick_interval, Duration::from_secs(10));
        assert_eq!(policy.idle_threshold, Duration::from_secs(600));
        assert_eq!(policy.retention, Duration::from_secs(259_200));
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
        assert_eq!(settings.renderer.actor_name, "rendering_browser");
        assert!(settings.problems().is_empty());
    }

    #[test]
    fn partial_source_keeps_other_defaults() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "workers": 4,
            "cache": { "lookup": "prefix" },
            "renderer": { "idle_threshold_secs": 60 }
        }))
        .unwrap();

        assert_eq!(settings.workers, 4);
        assert_eq!(settings.cache.lookup, CacheLookup::Prefix);
        assert_eq!(settings.cache.retention_secs, 259_200);
        assert_eq!(settings.renderer.idle_threshold_secs, 60);
        assert_eq!(settings.renderer.tick_interval_secs, 10);
    }

    #[test]
    fn zero_workers_is_a_problem() {
        let settings = Settings {
            workers: 0,
            ..Settings::default()
        };
        assert_eq!(settings.problems(), vec!["workers must be at least 1"]);
    }

    #[test]
    fn journal_implies_a_file_cache() {
        let mut settings = Settings::default();
        assert_eq!(settings.effective_cache_dir(), None);

        settings.journal_dir = Some(PathBuf::from("/var/lib/pressroom"));
        assert_eq!(settings.effective_cache_dir(), Some(PathBuf::from("/var/lib/pressroom/cache")));

        settings.cache_dir = Some(PathBuf::from("/tmp/docs"));
        assert_eq!(settings.effective_cache_dir(), Some(PathBuf::from("/tmp/docs")));
    }
}
