//! Engine Facade (C11): wires the Frontier, Scheduler, Metrics, and
//! Processor factories behind a single `run` entry point.
//!
//! A thin wrapper that builds its collaborators from a validated config
//! and hands back a report, rather than exposing Frontier/Scheduler/
//! Metrics piecemeal to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use url::Url;

use crate::browser::BrowserDriver;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::frontier::{Frontier, UrlEntity, UrlStatus};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::processor::Processor;
use crate::processors::{ContentFinder, ElementCleaner, LinksFinder, PageMonitor, PdfExporter, RequestMonitor};
use crate::retry_gate::{NoRetry, RetryGate};
use crate::scheduler::{ProcessorFactory, Scheduler};
use crate::util::parent_dir;

/// Outcome of a completed engine run: every URL left `Visited` with a
/// `pdf_path` it produced, plus the final Frontier census and a metrics
/// snapshot for the caller to export however it likes.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub pdf_paths: Vec<std::path::PathBuf>,
    pub url_counts: HashMap<UrlStatus, usize>,
    pub metrics: MetricsSnapshot,
}

/// The harvesting engine: a validated config, a browser driver, a retry
/// policy, and the Frontier/Metrics it owns for the run's lifetime.
pub struct Engine {
    config: Arc<EngineConfig>,
    frontier: Arc<Frontier>,
    driver: Arc<dyn BrowserDriver>,
    metrics: Arc<EngineMetrics>,
    retry_gate: Arc<dyn RetryGate>,
}

impl Engine {
    /// Builds an engine from a validated `config` and an already-launched
    /// `driver`. Seeds the Frontier with `config.entry_urls()` as `Pending`
    /// items in category `"entry"`. A `retry_gate` of `None` installs
    /// `NoRetry`, which never promotes `Failed` URLs back to `Pending`.
    pub fn new(
        config: EngineConfig,
        driver: Arc<dyn BrowserDriver>,
        retry_gate: Option<Arc<dyn RetryGate>>,
    ) -> EngineResult<Self> {
        let frontier = Frontier::new();
        for raw_url in config.entry_urls() {
            match UrlEntity::new(raw_url, "entry") {
                Some(entity) => {
                    frontier.add(entity);
                }
                None => {
                    return Err(EngineError::Config(format!("invalid entry url: {raw_url}")));
                }
            }
        }

        Ok(Self {
            config: Arc::new(config),
            frontier: Arc::new(frontier),
            driver,
            metrics: Arc::new(EngineMetrics::new()),
            retry_gate: retry_gate.unwrap_or_else(|| Arc::new(NoRetry)),
        })
    }

    /// Runs the scheduler to completion and returns a report of the
    /// resulting artifacts, frontier census, and metrics snapshot.
    pub async fn run(&self) -> EngineResult<EngineReport> {
        let factories = self.build_processor_factories();
        let scheduler = Scheduler::new(
            Arc::clone(&self.config),
            Arc::clone(&self.frontier),
            Arc::clone(&self.driver),
            Arc::clone(&self.metrics),
            Arc::clone(&self.retry_gate),
            factories,
        );

        scheduler.run().await.map_err(EngineError::Startup)?;

        for status in UrlStatus::ALL {
            self.metrics
                .set_url_status_count(status, self.frontier.count_by_status(status) as u64);
        }

        Ok(EngineReport {
            pdf_paths: scheduler.pdf_paths(),
            url_counts: self.frontier.snapshot(),
            metrics: self.metrics.snapshot(),
        })
    }

    #[must_use]
    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Builds one nullary constructor per configured processor, each
    /// closing over the subset of `self.config` it needs. A fresh instance
    /// is produced per admitted tab so every Page Context gets its own
    /// processor state (`ready_pass_done`, `installed`, and so on).
    fn build_processor_factories(&self) -> Vec<ProcessorFactory> {
        let config = Arc::clone(&self.config);
        let mut factories: Vec<ProcessorFactory> = Vec::new();

        {
            let config = Arc::clone(&config);
            factories.push(Box::new(move || {
                Box::new(PageMonitor::new(config.page_timeout(), config.page_timeout() / 10))
                    as Box<dyn Processor>
            }));
        }
        {
            let config = Arc::clone(&config);
            factories.push(Box::new(move || {
                Box::new(RequestMonitor::new(
                    config.slow_request_threshold(),
                    config.failed_request_threshold(),
                    config.block_patterns().to_vec(),
                )) as Box<dyn Processor>
            }));
        }
        {
            let config = Arc::clone(&config);
            let entry_dirs = entry_directories(config.entry_urls());
            let patterns = links_finder_patterns(&config, &entry_dirs);
            factories.push(Box::new(move || {
                Box::new(LinksFinder::new(
                    config.links_selector().to_string(),
                    patterns.clone(),
                    entry_dirs.clone(),
                    config.max_depth(),
                )) as Box<dyn Processor>
            }));
        }
        {
            let config = Arc::clone(&config);
            factories.push(Box::new(move || {
                Box::new(ElementCleaner::new(config.clean_selector().to_string())) as Box<dyn Processor>
            }));
        }
        {
            let config = Arc::clone(&config);
            factories.push(Box::new(move || {
                Box::new(ContentFinder::new(config.content_selector().to_string(), Vec::new()))
                    as Box<dyn Processor>
            }));
        }
        {
            let config = Arc::clone(&config);
            factories.push(Box::new(move || {
                Box::new(PdfExporter::new(config.output_dir().to_path_buf())) as Box<dyn Processor>
            }));
        }

        factories
    }
}

/// Parent directories of every entry URL, used both as the `LinksFinder`
/// max-depth baseline and, when `url_patterns` is empty, as the source for
/// an auto-derived inclusion pattern.
fn entry_directories(entry_urls: &[String]) -> Vec<Url> {
    entry_urls
        .iter()
        .filter_map(|raw| Url::parse(raw).ok())
        .map(|url| parent_dir(&url))
        .collect()
}

fn links_finder_patterns(config: &EngineConfig, entry_dirs: &[Url]) -> Vec<Regex> {
    if !config.url_patterns_compiled().is_empty() {
        return config.url_patterns_compiled().to_vec();
    }

    entry_dirs
        .iter()
        .filter_map(|dir| Regex::new(&format!("^{}.*$", regex::escape(dir.as_str()))).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_directories_strip_trailing_segment() {
        let dirs = entry_directories(&["https://site/a/b".to_string()]);
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].as_str(), "https://site/a/");
    }

    #[test]
    fn entry_directories_keep_directory_style_urls_as_is() {
        let dirs = entry_directories(&["https://site/a/".to_string()]);
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].as_str(), "https://site/a/");
    }
}
