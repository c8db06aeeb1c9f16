//! Page Context (C2): per-tab shared state bag, processor registry, and
//! lifecycle timestamps.
//!
//! A strongly-typed [`PageData`] record — one field per reserved key —
//! plus an open `extra` map for processor-private scratch data that
//! doesn't warrant a named field. `PageData` lives behind a
//! `tokio::sync::Mutex` rather than a plain field because the Request
//! Observer's callbacks (C6) run on the chromiumoxide event-stream task,
//! distinct from the scheduler's tick task; the lock is the
//! serialization point that makes sharing it across those two tasks safe.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::browser::BrowserTab;
use crate::frontier::UrlEntity;
use crate::processor::Processor;

/// The tri-value synchronization barrier set by `PageMonitor` and consulted
/// by every downstream processor. Monotonic within a single Page Context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PageState {
    Loading,
    Ready,
    Completed,
}

/// A block pattern installed by `RequestMonitor`.
#[derive(Debug, Clone)]
pub struct BlockedPattern {
    pub pattern: String,
    pub reason: String,
    pub installed_at_ms: u64,
}

/// An audit-trail entry for a link `LinksFinder` discovered.
#[derive(Debug, Clone)]
pub struct DiscoveredLink {
    pub url: String,
    pub discovered_at_ms: u64,
    pub selector: String,
}

/// An in-flight request `PageMonitor` is timing. Carries the request's URL
/// so `RequestMonitor` can match it against newly-installed block patterns
/// without a second round-trip to the browser.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    pub request_id: String,
    pub url: String,
    pub started_at: Instant,
}

/// The strongly-typed per-page data bag. Field visibility is `pub`: a
/// field written by one processor is meant to be read only by processors
/// of numerically-larger priority, but the type system can't enforce that
/// ordering — it remains a documentation contract.
#[derive(Debug, Default)]
pub struct PageData {
    pub page_state: Option<PageState>,
    pub slow_requests: HashMap<String, u32>,
    pub failed_requests: HashMap<String, u32>,
    pub pending_requests: HashMap<String, RequestHandle>,
    pub blocked_url_patterns: Vec<BlockedPattern>,
    pub discovered_links: Vec<DiscoveredLink>,
    pub elements_removed: u32,
    pub core_content_processed: bool,
    pub content_length: u64,
    pub pdf_path: Option<PathBuf>,
    pub pdf_exported: bool,
    pub page_title: Option<String>,
    /// Open extension map for processor-private scratch data.
    pub extra: HashMap<String, serde_json::Value>,
}

/// Per-tab record bound for the entire lifetime of a tab.
pub struct PageContext {
    pub url: UrlEntity,
    pub tab: Arc<dyn BrowserTab>,
    pub start_time: Instant,
    data: Arc<Mutex<PageData>>,
    processors: HashMap<String, Box<dyn Processor>>,
    /// Processor names in ascending-priority order; rebuilt on insertion
    /// since the processor count per page is fixed and tiny (six).
    priority_order: Vec<String>,
}

impl PageContext {
    #[must_use]
    pub fn new(tab: Arc<dyn BrowserTab>, url: UrlEntity) -> Self {
        Self {
            url,
            tab,
            start_time: Instant::now(),
            data: Arc::new(Mutex::new(PageData::default())),
            processors: HashMap::new(),
            priority_order: Vec::new(),
        }
    }

    /// Registers `processor`, keyed by its name. A processor appearing
    /// twice under the same name replaces the prior instance — factories
    /// are expected to produce distinct names, and the caller should
    /// avoid registering duplicates.
    pub fn add_processor(&mut self, processor: Box<dyn Processor>) {
        let name = processor.name().to_string();
        self.processors.insert(name.clone(), processor);
        if !self.priority_order.contains(&name) {
            self.priority_order.push(name);
        }
        self.priority_order.sort_by_key(|n| {
            self.processors
                .get(n)
                .map(|p| p.priority())
                .unwrap_or(i32::MAX)
        });
    }

    #[must_use]
    pub fn get_processor(&self, name: &str) -> Option<&Box<dyn Processor>> {
        self.processors.get(name)
    }

    pub fn get_processor_mut(&mut self, name: &str) -> Option<&mut Box<dyn Processor>> {
        self.processors.get_mut(name)
    }

    /// Temporarily removes a processor from the registry so the scheduler
    /// can call its `&mut self` methods while passing `&self` (the
    /// `PageContext`) as an argument without a borrow conflict. Pair with
    /// [`Self::put_processor`].
    pub fn take_processor(&mut self, name: &str) -> Option<Box<dyn Processor>> {
        self.processors.remove(name)
    }

    /// Reinserts a processor removed by [`Self::take_processor`]. Does not
    /// re-sort `priority_order` — the processor's priority cannot change
    /// between take and put.
    pub fn put_processor(&mut self, name: &str, processor: Box<dyn Processor>) {
        self.processors.insert(name.to_string(), processor);
    }

    /// Processor names ordered by priority: ascending for detect/run,
    /// descending for finish.
    #[must_use]
    pub fn processor_names_by_priority(&self, ascending: bool) -> Vec<String> {
        if ascending {
            self.priority_order.clone()
        } else {
            self.priority_order.iter().rev().cloned().collect()
        }
    }

    /// Lock the data bag. Shared between scheduler-driven processor calls
    /// and Request Observer callbacks running on the driver's event task.
    pub async fn data(&self) -> tokio::sync::MutexGuard<'_, PageData> {
        self.data.lock().await
    }

    /// A clonable handle to the data bag, for callbacks registered on the
    /// browser driver's own event-stream task.
    #[must_use]
    pub fn data_handle(&self) -> Arc<Mutex<PageData>> {
        Arc::clone(&self.data)
    }

    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
