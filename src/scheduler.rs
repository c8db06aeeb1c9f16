//! Tab Scheduler (C5): the engine's single main loop.
//!
//! Semaphore-bounded concurrency over a live tab set, with a dedicated
//! admission/tick/timeout/idle-retry state machine rather than a pure
//! breadth-first queue.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::browser::BrowserDriver;
use crate::config::EngineConfig;
use crate::frontier::{Frontier, UrlEntity, UrlStatus};
use crate::metrics::EngineMetrics;
use crate::page_context::PageContext;
use crate::processor::{Processor, ProcessorSignal, ProcessorState};
use crate::retry_gate::RetryGate;
use crate::util::extract_domain;

/// A nullary constructor for one processor instance, invoked once per
/// admitted tab so every Page Context gets its own processor state.
pub type ProcessorFactory = Box<dyn Fn() -> Box<dyn Processor> + Send + Sync>;

struct LiveTab {
    ctx: PageContext,
    states: HashMap<String, ProcessorState>,
}

/// Drives admission, per-tab ticking, completion/timeout, and the
/// idle/retry branch described in the scheduler's main-loop contract.
pub struct Scheduler {
    config: Arc<EngineConfig>,
    frontier: Arc<Frontier>,
    driver: Arc<dyn BrowserDriver>,
    metrics: Arc<EngineMetrics>,
    retry_gate: Arc<dyn RetryGate>,
    processor_factories: Vec<ProcessorFactory>,
    pdf_paths: Mutex<Vec<PathBuf>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        config: Arc<EngineConfig>,
        frontier: Arc<Frontier>,
        driver: Arc<dyn BrowserDriver>,
        metrics: Arc<EngineMetrics>,
        retry_gate: Arc<dyn RetryGate>,
        processor_factories: Vec<ProcessorFactory>,
    ) -> Self {
        Self {
            config,
            frontier,
            driver,
            metrics,
            retry_gate,
            processor_factories,
            pdf_paths: Mutex::new(Vec::new()),
        }
    }

    /// PDF paths produced by every tab that reached `PdfExporter` success,
    /// in finalization order. Populated as tabs finish, so only meaningful
    /// once [`Scheduler::run`] has returned.
    #[must_use]
    pub fn pdf_paths(&self) -> Vec<PathBuf> {
        self.pdf_paths.lock().clone()
    }

    /// Runs the scheduler to completion: drains the Frontier (consulting the
    /// Retry Gate whenever it goes idle) and returns once no more work
    /// remains.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut live: HashMap<String, LiveTab> = HashMap::new();

        loop {
            self.admit(&mut live).await;
            self.metrics.set_live_tabs(live.len());

            if live.is_empty() && self.frontier.count_by_status(UrlStatus::Pending) == 0 {
                if self.consult_retry_gate().await {
                    continue;
                }
                break;
            }

            self.tick(&mut live).await;
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        Ok(())
    }

    /// Admission: open up to `K - live.len()` new tabs for the oldest
    /// PENDING URLs.
    async fn admit(&self, live: &mut HashMap<String, LiveTab>) {
        let k = self.config.max_concurrent_tabs();
        let available = k.saturating_sub(live.len());
        if available == 0 {
            return;
        }

        let candidates = self.frontier.by_status(UrlStatus::Pending, Some(available), true);
        for entity in candidates {
            self.frontier.update_status(&entity.id, UrlStatus::Processing);

            let tab = match self.driver.open_tab().await {
                Ok(tab) => tab,
                Err(e) => {
                    warn!("failed to open tab for {}: {e}", entity.url);
                    self.metrics.record_error("tab_open", "scheduler");
                    self.frontier.update_status(&entity.id, UrlStatus::Failed);
                    continue;
                }
            };

            let nav_result = tab.navigate(&entity.url, self.config.page_timeout()).await;
            if let Err(e) = nav_result {
                debug!("navigation failed for {}: {e}", entity.url);
                self.metrics.record_error("navigation", "scheduler");
                self.frontier.update_status(&entity.id, UrlStatus::Failed);
                let _ = tab.close().await;
                continue;
            }

            let mut ctx = PageContext::new(tab, entity.clone());
            let mut states = HashMap::new();
            for factory in &self.processor_factories {
                let processor = factory();
                states.insert(processor.name().to_string(), ProcessorState::Waiting);
                ctx.add_processor(processor);
            }

            live.insert(entity.id.clone(), LiveTab { ctx, states });
        }
    }

    /// Per-tab tick plus completion/timeout handling for every live tab.
    async fn tick(&self, live: &mut HashMap<String, LiveTab>) {
        let mut finished_ids = Vec::new();

        for (id, tab) in live.iter_mut() {
            let any_pending = self.tick_one(tab).await;

            let timed_out = tab.ctx.elapsed() > self.config.page_timeout();

            if !any_pending {
                self.finalize_tab(tab, UrlStatus::Visited).await;
                finished_ids.push(id.clone());
            } else if timed_out {
                warn!("tab timed out for {}", tab.ctx.url.url);
                self.metrics.record_error("tab_timeout", "scheduler");
                self.finalize_tab(tab, UrlStatus::Failed).await;
                finished_ids.push(id.clone());
            }
        }

        for id in finished_ids {
            live.remove(&id);
        }
    }

    /// Runs one tick of every processor in ascending-priority order.
    /// Returns whether any processor still has pending work (WAITING or
    /// RUNNING), i.e. whether the tab is *not* yet done.
    async fn tick_one(&self, tab: &mut LiveTab) -> bool {
        let names = tab.ctx.processor_names_by_priority(true);
        let mut any_pending = false;

        for name in names {
            let state = tab.states.get(&name).copied().unwrap_or(ProcessorState::Waiting);
            if matches!(state, ProcessorState::Cancelled | ProcessorState::Finished) {
                continue;
            }

            let Some(mut processor) = tab.ctx.take_processor(&name) else {
                continue;
            };

            let new_state = if state == ProcessorState::Running {
                self.continue_running(&name, processor.as_mut(), &tab.ctx).await
            } else {
                self.detect_and_maybe_run(&name, processor.as_mut(), &tab.ctx).await
            };

            tab.ctx.put_processor(&name, processor);
            tab.states.insert(name.clone(), new_state);

            if matches!(new_state, ProcessorState::Waiting | ProcessorState::Running) {
                any_pending = true;
            }
        }

        any_pending
    }

    async fn continue_running(
        &self,
        name: &str,
        processor: &mut dyn Processor,
        ctx: &PageContext,
    ) -> ProcessorState {
        match processor.run(ctx, &self.frontier).await {
            Ok(signal) => {
                self.metrics.record_processor_transition(name, signal, "continue");
                signal_to_state(signal)
            }
            Err(e) => {
                warn!("processor '{name}' run failed: {e}");
                self.metrics.record_error("processor_run", "scheduler");
                ProcessorState::Cancelled
            }
        }
    }

    async fn detect_and_maybe_run(
        &self,
        name: &str,
        processor: &mut dyn Processor,
        ctx: &PageContext,
    ) -> ProcessorState {
        let signal = match tokio::time::timeout(self.config.detect_timeout(), processor.detect(ctx, &self.frontier)).await {
            Ok(signal) => signal,
            Err(_) => {
                debug!("processor '{name}' detect timed out");
                ProcessorSignal::Waiting
            }
        };

        self.metrics.record_processor_transition(name, signal, "detect");

        match signal {
            ProcessorSignal::Ready => self.continue_running(name, processor, ctx).await,
            ProcessorSignal::Completed => ProcessorState::Completed,
            ProcessorSignal::Cancelled => ProcessorState::Cancelled,
            ProcessorSignal::Waiting => ProcessorState::Waiting,
            ProcessorSignal::Running => ProcessorState::Running,
        }
    }

    /// Marks the URL `status`, closes the tab, and drains `finish` calls for
    /// every processor that reached COMPLETED, in descending-priority
    /// order.
    async fn finalize_tab(&self, tab: &mut LiveTab, status: UrlStatus) {
        let domain = extract_domain(&tab.ctx.url.url);
        self.metrics.record_page_duration(status, &domain, tab.ctx.elapsed());
        {
            let data = tab.ctx.data().await;
            self.metrics.record_page_content_size(data.content_length);
            for _ in 0..data.slow_requests.len() {
                self.metrics.record_slow_request();
            }
            for _ in 0..data.failed_requests.len() {
                self.metrics.record_failed_request();
            }
            if data.pdf_exported {
                if let Some(path) = &data.pdf_path {
                    self.pdf_paths.lock().push(path.clone());
                }
            }
        }

        self.frontier.update_status(&tab.ctx.url.id, status);

        let finish_order = tab.ctx.processor_names_by_priority(false);
        for name in finish_order {
            if tab.states.get(&name).copied() != Some(ProcessorState::Completed) {
                continue;
            }
            let Some(mut processor) = tab.ctx.take_processor(&name) else {
                continue;
            };
            if let Err(e) = processor.finish(&tab.ctx).await {
                warn!("processor '{name}' finish failed: {e}");
                self.metrics.record_error("processor_finish", "scheduler");
            }
            tab.ctx.put_processor(&name, processor);
            tab.states.insert(name, ProcessorState::Finished);
        }

        if let Err(e) = tab.ctx.tab.close().await {
            debug!("tab close failed for {}: {e}", tab.ctx.url.url);
            self.metrics.record_error("tab_close", "scheduler");
        }
    }

    /// Idle branch: consults the Retry Gate with the current FAILED set;
    /// promotes it back to PENDING on `true`.
    async fn consult_retry_gate(&self) -> bool {
        let failed: Vec<UrlEntity> = self.frontier.by_status(UrlStatus::Failed, None, true);
        if failed.is_empty() {
            return false;
        }

        if self.retry_gate.should_retry(&failed) {
            for entity in &failed {
                self.frontier.update_status(&entity.id, UrlStatus::Pending);
            }
            true
        } else {
            false
        }
    }
}

fn signal_to_state(signal: ProcessorSignal) -> ProcessorState {
    match signal {
        ProcessorSignal::Waiting => ProcessorState::Waiting,
        ProcessorSignal::Ready => ProcessorState::Running,
        ProcessorSignal::Running => ProcessorState::Running,
        ProcessorSignal::Completed => ProcessorState::Completed,
        ProcessorSignal::Cancelled => ProcessorState::Cancelled,
    }
}
