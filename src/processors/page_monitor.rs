//! PageMonitor (priority 0): installs the Request Observer's callbacks on
//! the tab and drives `page_state` through its `Loading -> Ready ->
//! Completed` progression.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{TabEvent, TabEventSink};
use crate::frontier::Frontier;
use crate::page_context::{PageContext, PageData, PageState, RequestHandle};
use crate::processor::{Processor, ProcessorSignal};
use crate::util::strip_query;

use super::PRIORITY_PAGE_MONITOR;

/// Forwards browser tab events into the Page Context's data bag. Runs on
/// whatever task the concrete `BrowserDriver` pumps its event stream on —
/// for `ChromiumDriver` that is a background tokio task distinct from the
/// scheduler's tick task, which is why every write here goes through the
/// bag's `tokio::sync::Mutex` rather than being lock-free (see
/// `PageContext::data`).
struct PageMonitorSink {
    data: Arc<tokio::sync::Mutex<PageData>>,
    slow_threshold: Duration,
}

impl TabEventSink for PageMonitorSink {
    fn on_event(&self, event: TabEvent) {
        let data = Arc::clone(&self.data);
        let slow_threshold = self.slow_threshold;
        tokio::spawn(async move {
            let mut data = data.lock().await;
            match event {
                TabEvent::RequestStarted { request_id, url } => {
                    data.pending_requests.insert(
                        request_id.clone(),
                        RequestHandle { request_id, url, started_at: Instant::now() },
                    );
                }
                TabEvent::ResponseReceived { request_id, url } => {
                    if let Some(handle) = data.pending_requests.remove(&request_id)
                        && handle.started_at.elapsed() > slow_threshold
                    {
                        *data.slow_requests.entry(strip_query(&url)).or_insert(0) += 1;
                    }
                }
                TabEvent::RequestFailed { request_id, url, reason } => {
                    let key = data
                        .pending_requests
                        .remove(&request_id)
                        .map(|h| h.url)
                        .unwrap_or(url);
                    *data.failed_requests.entry(strip_query(&key)).or_insert(0) += 1;
                    debug!("request {request_id} failed: {reason}");
                }
                TabEvent::Load | TabEvent::DomContentLoaded => {
                    if matches!(data.page_state, None | Some(PageState::Loading)) {
                        data.page_state = Some(PageState::Ready);
                    }
                }
            }
        });
    }
}

/// Monitors tab-level page load progress: installs the observer on its
/// first `run`, then polls `document.readyState` plus a bounded
/// network-idle wait on every later tick until `page_state` reaches
/// `Completed`.
pub struct PageMonitor {
    installed: bool,
    slow_threshold: Duration,
    network_idle_timeout: Duration,
}

impl PageMonitor {
    #[must_use]
    pub fn new(page_timeout: Duration, network_idle_timeout: Duration) -> Self {
        Self {
            installed: false,
            slow_threshold: page_timeout / 10,
            network_idle_timeout,
        }
    }
}

#[async_trait]
impl Processor for PageMonitor {
    fn name(&self) -> &str {
        "page_monitor"
    }

    fn priority(&self) -> i32 {
        PRIORITY_PAGE_MONITOR
    }

    async fn detect(&mut self, ctx: &PageContext, _frontier: &Frontier) -> ProcessorSignal {
        if !self.installed {
            return ProcessorSignal::Ready;
        }
        match ctx.data().await.page_state {
            Some(PageState::Completed) => ProcessorSignal::Completed,
            _ => ProcessorSignal::Running,
        }
    }

    async fn run(&mut self, ctx: &PageContext, _frontier: &Frontier) -> anyhow::Result<ProcessorSignal> {
        if !self.installed {
            let sink = Arc::new(PageMonitorSink {
                data: ctx.data_handle(),
                slow_threshold: self.slow_threshold,
            });
            ctx.tab.install_observer(sink).await?;
            {
                let mut data = ctx.data().await;
                data.page_state = Some(PageState::Loading);
            }
            self.installed = true;
            return Ok(ProcessorSignal::Running);
        }

        let ready_state = ctx.tab.ready_state().await.unwrap_or_default();
        if ready_state != "loading" {
            let mut data = ctx.data().await;
            if data.page_state == Some(PageState::Loading) {
                data.page_state = Some(PageState::Ready);
            }
        }

        let idle = ctx
            .tab
            .wait_for_network_idle(self.network_idle_timeout)
            .await
            .unwrap_or(false);
        if idle {
            let mut data = ctx.data().await;
            if data.page_state == Some(PageState::Ready) {
                data.page_state = Some(PageState::Completed);
            }
        }

        let page_state = ctx.data().await.page_state;
        Ok(match page_state {
            Some(PageState::Completed) => ProcessorSignal::Completed,
            _ => ProcessorSignal::Running,
        })
    }

    async fn finish(&mut self, ctx: &PageContext) -> anyhow::Result<()> {
        ctx.tab.close().await
    }
}
