//! Core configuration type for the harvesting engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine Configuration (C10): every row of the external configuration
/// surface, typed and defaulted. Built exclusively through
/// [`super::builder::EngineConfigBuilder`] so the two required fields
/// (`entry_urls`, `output_dir`) can never be forgotten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub(crate) entry_urls: Vec<String>,
    pub(crate) output_dir: PathBuf,
    pub(crate) max_concurrent_tabs: usize,
    pub(crate) page_timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) detect_timeout: Duration,
    pub(crate) headless: bool,
    pub(crate) block_patterns: Vec<String>,
    pub(crate) slow_request_threshold: u32,
    pub(crate) failed_request_threshold: u32,
    pub(crate) links_selector: String,
    pub(crate) url_patterns: Vec<String>,
    /// Compiled once at build time to avoid recompiling a regex per link
    /// on every `LinksFinder` tick.
    #[serde(skip)]
    pub(crate) url_patterns_compiled: Vec<regex::Regex>,
    pub(crate) max_depth: u8,
    pub(crate) clean_selector: String,
    pub(crate) content_selector: String,
}

impl EngineConfig {
    #[must_use]
    pub fn entry_urls(&self) -> &[String] {
        &self.entry_urls
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn max_concurrent_tabs(&self) -> usize {
        self.max_concurrent_tabs
    }

    #[must_use]
    pub fn page_timeout(&self) -> Duration {
        self.page_timeout
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn detect_timeout(&self) -> Duration {
        self.detect_timeout
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn block_patterns(&self) -> &[String] {
        &self.block_patterns
    }

    #[must_use]
    pub fn slow_request_threshold(&self) -> u32 {
        self.slow_request_threshold
    }

    #[must_use]
    pub fn failed_request_threshold(&self) -> u32 {
        self.failed_request_threshold
    }

    #[must_use]
    pub fn links_selector(&self) -> &str {
        &self.links_selector
    }

    #[must_use]
    pub fn url_patterns_compiled(&self) -> &[regex::Regex] {
        &self.url_patterns_compiled
    }

    #[must_use]
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    #[must_use]
    pub fn clean_selector(&self) -> &str {
        &self.clean_selector
    }

    #[must_use]
    pub fn content_selector(&self) -> &str {
        &self.content_selector
    }
}
