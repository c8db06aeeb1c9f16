//! Type-safe builder for `EngineConfig` using the typestate pattern.
//!
//! Two fields are mandatory: `entry_urls` and `output_dir`. Both are
//! encoded as type-state transitions so `build()` only exists once both
//! have been supplied. Every other field has a default and a fluent
//! setter available at any state.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use regex::Regex;

use super::types::EngineConfig;

/// Compiles one `url_patterns` entry, once at build time, so `LinksFinder`
/// never recompiles a pattern per link on every tick. Inclusion/block
/// lists are true regex, not glob (see `DESIGN.md`'s "Regex-vs-glob
/// patterns" entry).
fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| anyhow!("invalid url pattern '{pattern}': {e}"))
}

pub struct NeedsOutputDir;
pub struct NeedsEntryUrls;
pub struct Ready;

pub struct EngineConfigBuilder<State = NeedsOutputDir> {
    pub(crate) entry_urls: Vec<String>,
    pub(crate) output_dir: Option<PathBuf>,
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
    pub(crate) max_depth: u8,
    pub(crate) clean_selector: String,
    pub(crate) content_selector: String,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for EngineConfigBuilder<NeedsOutputDir> {
    fn default() -> Self {
        Self {
            entry_urls: Vec::new(),
            output_dir: None,
            max_concurrent_tabs: 5,
            page_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(200),
            detect_timeout: Duration::from_secs(5),
            headless: true,
            block_patterns: Vec::new(),
            slow_request_threshold: 100,
            failed_request_threshold: 10,
            links_selector: "a[href]".to_string(),
            url_patterns: Vec::new(),
            max_depth: 3,
            clean_selector: "script, style, nav, footer, aside".to_string(),
            content_selector: "main, article, body".to_string(),
            _phantom: PhantomData,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn builder() -> EngineConfigBuilder<NeedsOutputDir> {
        EngineConfigBuilder::default()
    }
}

impl EngineConfigBuilder<NeedsOutputDir> {
    /// Sets the PDF destination directory, advancing to the next required
    /// field.
    #[must_use]
    pub fn output_dir(self, dir: impl Into<PathBuf>) -> EngineConfigBuilder<NeedsEntryUrls> {
        EngineConfigBuilder {
            entry_urls: self.entry_urls,
            output_dir: Some(dir.into()),
            max_concurrent_tabs: self.max_concurrent_tabs,
            page_timeout: self.page_timeout,
            poll_interval: self.poll_interval,
            detect_timeout: self.detect_timeout,
            headless: self.headless,
            block_patterns: self.block_patterns,
            slow_request_threshold: self.slow_request_threshold,
            failed_request_threshold: self.failed_request_threshold,
            links_selector: self.links_selector,
            url_patterns: self.url_patterns,
            max_depth: self.max_depth,
            clean_selector: self.clean_selector,
            content_selector: self.content_selector,
            _phantom: PhantomData,
        }
    }
}

impl EngineConfigBuilder<NeedsEntryUrls> {
    /// Sets the seed URLs, advancing to the buildable state.
    #[must_use]
    pub fn entry_urls<I, S>(mut self, urls: I) -> EngineConfigBuilder<Ready>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_urls = urls.into_iter().map(Into::into).collect();
        EngineConfigBuilder {
            entry_urls: self.entry_urls,
            output_dir: self.output_dir,
            max_concurrent_tabs: self.max_concurrent_tabs,
            page_timeout: self.page_timeout,
            poll_interval: self.poll_interval,
            detect_timeout: self.detect_timeout,
            headless: self.headless,
            block_patterns: self.block_patterns,
            slow_request_threshold: self.slow_request_threshold,
            failed_request_threshold: self.failed_request_threshold,
            links_selector: self.links_selector,
            url_patterns: self.url_patterns,
            max_depth: self.max_depth,
            clean_selector: self.clean_selector,
            content_selector: self.content_selector,
            _phantom: PhantomData,
        }
    }
}

impl EngineConfigBuilder<Ready> {
    pub fn build(self) -> Result<EngineConfig> {
        let url_patterns_compiled = self
            .url_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(EngineConfig {
            entry_urls: self.entry_urls,
            output_dir: self
                .output_dir
                .ok_or_else(|| anyhow!("output_dir is required"))?,
            max_concurrent_tabs: self.max_concurrent_tabs,
            page_timeout: self.page_timeout,
            poll_interval: self.poll_interval,
            detect_timeout: self.detect_timeout,
            headless: self.headless,
            block_patterns: self.block_patterns,
            slow_request_threshold: self.slow_request_threshold,
            failed_request_threshold: self.failed_request_threshold,
            links_selector: self.links_selector,
            url_patterns: self.url_patterns,
            url_patterns_compiled,
            max_depth: self.max_depth,
            clean_selector: self.clean_selector,
            content_selector: self.content_selector,
        })
    }
}

// State-independent setters: every optional field can be tuned regardless
// of which required fields have been supplied so far.
impl<State> EngineConfigBuilder<State> {
    #[must_use]
    pub fn max_concurrent_tabs(mut self, n: usize) -> Self {
        self.max_concurrent_tabs = n;
        self
    }

    #[must_use]
    pub fn page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn detect_timeout(mut self, timeout: Duration) -> Self {
        self.detect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn block_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.block_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn slow_request_threshold(mut self, threshold: u32) -> Self {
        self.slow_request_threshold = threshold;
        self
    }

    #[must_use]
    pub fn failed_request_threshold(mut self, threshold: u32) -> Self {
        self.failed_request_threshold = threshold;
        self
    }

    #[must_use]
    pub fn links_selector(mut self, selector: impl Into<String>) -> Self {
        self.links_selector = selector.into();
        self
    }

    #[must_use]
    pub fn url_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: u8) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn clean_selector(mut self, selector: impl Into<String>) -> Self {
        self.clean_selector = selector.into();
        self
    }

    #[must_use]
    pub fn content_selector(mut self, selector: impl Into<String>) -> Self {
        self.content_selector = selector.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_output_dir_and_entry_urls() {
        let config = EngineConfig::builder()
            .output_dir("/tmp/out")
            .entry_urls(["https://example.org"])
            .build()
            .expect("should build with both required fields set");

        assert_eq!(config.output_dir(), std::path::Path::new("/tmp/out"));
        assert_eq!(config.entry_urls(), &["https://example.org".to_string()]);
        assert_eq!(config.max_concurrent_tabs(), 5);
        assert_eq!(config.slow_request_threshold(), 100);
        assert_eq!(config.failed_request_threshold(), 10);
    }

    #[test]
    fn url_patterns_compile_as_regex() {
        let config = EngineConfig::builder()
            .output_dir("/tmp/out")
            .entry_urls(["https://example.org"])
            .url_patterns([r"^https://example\.org/docs/.*$"])
            .build()
            .expect("should build");

        let compiled = config.url_patterns_compiled();
        assert_eq!(compiled.len(), 1);
        assert!(compiled[0].is_match("https://example.org/docs/page"));
        assert!(!compiled[0].is_match("https://other.org/docs/page"));
    }

    #[test]
    fn rejects_invalid_regex_pattern() {
        let result = EngineConfig::builder()
            .output_dir("/tmp/out")
            .entry_urls(["https://example.org"])
            .url_patterns(["(unclosed"])
            .build();
        assert!(result.is_err());
    }
}
