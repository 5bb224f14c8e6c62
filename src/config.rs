use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

pub const DEFAULT_TIMEOUT_MS: u64 = 4000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_BASE_URL: &str = "https://www.saucedemo.com";

/// Harness-wide options shared by every scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Per-operation polling timeout
    #[serde(default = "default_timeout_ms", alias = "defaultTimeoutMs")]
    pub default_timeout_ms: u64,

    /// Delay between poll attempts
    #[serde(default = "default_poll_interval_ms", alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,

    /// Base URL that `Navigate` paths are joined onto
    #[serde(default = "default_base_url", alias = "baseUrl")]
    pub base_url: String,

    /// Upper bound on concurrently running scenarios
    #[serde(default = "default_parallel", alias = "maxParallelScenarios")]
    pub max_parallel_scenarios: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_parallel_scenarios: 1,
        }
    }
}

fn default_timeout_ms() -> u64 { DEFAULT_TIMEOUT_MS }
fn default_poll_interval_ms() -> u64 { DEFAULT_POLL_INTERVAL_MS }
fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_parallel() -> usize { 1 }

impl HarnessConfig {
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = ms;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn with_parallel(mut self, n: usize) -> Self {
        self.max_parallel_scenarios = n;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject option combinations the engine cannot honor.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(HarnessError::config("poll_interval_ms must be greater than 0"));
        }
        if self.default_timeout_ms < self.poll_interval_ms {
            return Err(HarnessError::config(format!(
                "default_timeout_ms ({}) must be at least poll_interval_ms ({})",
                self.default_timeout_ms, self.poll_interval_ms
            )));
        }
        if self.max_parallel_scenarios == 0 {
            return Err(HarnessError::config("max_parallel_scenarios must be at least 1"));
        }
        if !(self.base_url.starts_with("http://")
            || self.base_url.starts_with("https://")
            || self.base_url.starts_with("file://"))
        {
            return Err(HarnessError::config(format!(
                "base_url '{}' must be an http(s) or file URL",
                self.base_url
            )));
        }
        Ok(())
    }

    /// Join a navigation path onto the base URL. Absolute URLs pass through.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}
