//! RequestMonitor (priority 1): promotes repeatedly slow or failing URLs
//! into installed block patterns, and aborts any in-flight request that
//! already matches one.

use async_trait::async_trait;
use tracing::info;

use crate::frontier::Frontier;
use crate::page_context::{BlockedPattern, PageContext, PageState};
use crate::processor::{Processor, ProcessorSignal};

use super::{PRIORITY_REQUEST_MONITOR, now_ms};

/// Consumes `slow_requests` / `failed_requests`, installing a block
/// pattern (de-duplicated by pattern string) once either threshold is
/// crossed for a given query-stripped URL. Also installs the configured
/// `block_patterns` initial list on its first `run`.
pub struct RequestMonitor {
    slow_threshold: u32,
    failed_threshold: u32,
    initial_patterns: Vec<String>,
    initial_patterns_installed: bool,
}

impl RequestMonitor {
    #[must_use]
    pub fn new(slow_threshold: u32, failed_threshold: u32, initial_patterns: Vec<String>) -> Self {
        Self {
            slow_threshold,
            failed_threshold,
            initial_patterns,
            initial_patterns_installed: false,
        }
    }

    /// Installs the configured initial block list, once. A no-op once
    /// already installed or if none were configured.
    async fn ensure_initial_patterns(&mut self, ctx: &PageContext) -> anyhow::Result<()> {
        if self.initial_patterns_installed {
            return Ok(());
        }
        self.initial_patterns_installed = true;

        for pattern in &self.initial_patterns {
            ctx.tab.install_block_pattern(pattern).await?;
            let mut data = ctx.data().await;
            if !data.blocked_url_patterns.iter().any(|p| &p.pattern == pattern) {
                info!("installed configured initial block pattern for {pattern}");
                data.blocked_url_patterns.push(BlockedPattern {
                    pattern: pattern.clone(),
                    reason: "configured_initial_pattern".to_string(),
                    installed_at_ms: now_ms(),
                });
            }
        }
        Ok(())
    }

    /// Installs any newly-threshold-crossing patterns, then aborts
    /// in-flight requests matching an active pattern.
    async fn apply(&mut self, ctx: &PageContext) -> anyhow::Result<()> {
        self.ensure_initial_patterns(ctx).await?;

        let to_install: Vec<(String, &'static str)> = {
            let data = ctx.data().await;
            let mut candidates = Vec::new();
            for (url, count) in &data.slow_requests {
                if *count >= self.slow_threshold
                    && !data.blocked_url_patterns.iter().any(|p| &p.pattern == url)
                {
                    candidates.push((url.clone(), "slow_request_threshold_exceeded"));
                }
            }
            for (url, count) in &data.failed_requests {
                if *count >= self.failed_threshold
                    && !data.blocked_url_patterns.iter().any(|p| &p.pattern == url)
                    && !candidates.iter().any(|(u, _)| u == url)
                {
                    candidates.push((url.clone(), "failed_request_threshold_exceeded"));
                }
            }
            candidates
        };

        for (pattern, reason) in &to_install {
            ctx.tab.install_block_pattern(pattern).await?;
            let mut data = ctx.data().await;
            if !data.blocked_url_patterns.iter().any(|p| &p.pattern == pattern) {
                info!("installed block pattern for {pattern} ({reason})");
                data.blocked_url_patterns.push(BlockedPattern {
                    pattern: pattern.clone(),
                    reason: (*reason).to_string(),
                    installed_at_ms: now_ms(),
                });
            }
        }

        if to_install.is_empty() {
            return Ok(());
        }

        let matching: Vec<String> = {
            let data = ctx.data().await;
            data.pending_requests
                .values()
                .filter(|handle| {
                    data.blocked_url_patterns
                        .iter()
                        .any(|p| handle.url.contains(p.pattern.as_str()))
                })
                .map(|handle| handle.request_id.clone())
                .collect()
        };

        for request_id in matching {
            ctx.tab.abort_request(&request_id).await?;
            ctx.data().await.pending_requests.remove(&request_id);
        }

        Ok(())
    }
}

#[async_trait]
impl Processor for RequestMonitor {
    fn name(&self) -> &str {
        "request_monitor"
    }

    fn priority(&self) -> i32 {
        PRIORITY_REQUEST_MONITOR
    }

    async fn detect(&mut self, ctx: &PageContext, _frontier: &Frontier) -> ProcessorSignal {
        match ctx.data().await.page_state {
            Some(PageState::Ready) => ProcessorSignal::Ready,
            Some(PageState::Completed) => ProcessorSignal::Completed,
            _ => ProcessorSignal::Waiting,
        }
    }

    async fn run(&mut self, ctx: &PageContext, _frontier: &Frontier) -> anyhow::Result<ProcessorSignal> {
        self.apply(ctx).await?;
        let page_state = ctx.data().await.page_state;
        Ok(match page_state {
            Some(PageState::Completed) => ProcessorSignal::Completed,
            _ => ProcessorSignal::Running,
        })
    }

    async fn finish(&mut self, ctx: &PageContext) -> anyhow::Result<()> {
        let data = ctx.data().await;
        info!(
            "request_monitor finished with {} blocked pattern(s)",
            data.blocked_url_patterns.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_carries_configured_thresholds() {
        let monitor = RequestMonitor::new(100, 10, vec!["https://ads.example/*".to_string()]);
        assert_eq!(monitor.slow_threshold, 100);
        assert_eq!(monitor.failed_threshold, 10);
        assert_eq!(monitor.initial_patterns, vec!["https://ads.example/*".to_string()]);
    }
}
