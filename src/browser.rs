//! Browser Capability (C9): the trait surface the engine consumes instead
//! of depending on chromiumoxide types directly.
//!
//! Keeping the browser driver behind this trait pair lets the processor
//! contract be exercised in tests against a `MockTab` with no real browser
//! involved. [`crate::chromium`] is the one real implementation, backed by
//! chromiumoxide.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Request/response/navigation events `PageMonitor` observes via
/// [`BrowserTab::install_observer`]. Delivered on whatever task the
/// concrete driver runs its event stream on — not necessarily the
/// scheduler's tick task, which is why [`crate::page_context::PageData`]
/// lives behind a lock.
#[derive(Debug, Clone)]
pub enum TabEvent {
    RequestStarted { request_id: String, url: String },
    ResponseReceived { request_id: String, url: String },
    RequestFailed { request_id: String, url: String, reason: String },
    Load,
    DomContentLoaded,
}

/// Sink `PageMonitor` hands the driver so it can forward [`TabEvent`]s as
/// they occur. Implementations must be non-blocking — the source tab's
/// event pump should never wait on engine-side work.
pub trait TabEventSink: Send + Sync {
    fn on_event(&self, event: TabEvent);
}

/// One independent browser tab.
#[async_trait]
pub trait BrowserTab: Send + Sync {
    /// Navigate to `url`, waiting for `wait_until` (DOM-content-loaded) up
    /// to `timeout`. A timeout or network error here is the "transient
    /// navigation error" of the error taxonomy.
    async fn navigate(&self, url: &str, timeout: Duration) -> anyhow::Result<()>;

    /// The tab's current URL, used to resolve relative links.
    async fn current_url(&self) -> anyhow::Result<String>;

    /// `document.readyState`, polled by `PageMonitor` between network-idle
    /// waits.
    async fn ready_state(&self) -> anyhow::Result<String>;

    /// Best-effort wait for a quiet network period; returns `false` on
    /// timeout rather than erroring, since a busy page is not itself a
    /// failure.
    async fn wait_for_network_idle(&self, timeout: Duration) -> anyhow::Result<bool>;

    /// In-page JS evaluation: link extraction, DOM pruning, state queries,
    /// element removal.
    async fn evaluate(&self, js_source: &str) -> anyhow::Result<Value>;

    /// Count of elements currently matching `selector` (used by
    /// `ElementCleaner`/`ContentFinder` to decide "no match" outcomes
    /// without round-tripping a full node list through JSON).
    async fn query_selector_count(&self, selector: &str) -> anyhow::Result<usize>;

    /// The page's `<title>`, if any — consulted by `PDFExporter`'s title
    /// fallback trigger.
    async fn page_title(&self) -> anyhow::Result<Option<String>>;

    /// Installs `PageMonitor`'s passive request/response/load hooks.
    async fn install_observer(&self, sink: std::sync::Arc<dyn TabEventSink>) -> anyhow::Result<()>;

    /// Adds `pattern` to the set of URL patterns future requests are
    /// matched against and aborted if they match. Idempotent: installing
    /// the same pattern twice has no additional effect.
    async fn install_block_pattern(&self, pattern: &str) -> anyhow::Result<()>;

    /// Aborts a specific in-flight request by id, used when `RequestMonitor`
    /// finds an in-flight request matching a pattern just installed.
    async fn abort_request(&self, request_id: &str) -> anyhow::Result<()>;

    /// Renders the whole tab to PDF at `path`: A4, 1cm margins, background
    /// graphics enabled.
    async fn render_pdf(&self, path: &Path) -> anyhow::Result<()>;

    /// Full-page screenshot, used by observability only.
    async fn screenshot(&self, path: &Path) -> anyhow::Result<()>;

    /// Idempotent tab close.
    async fn close(&self) -> anyhow::Result<()>;
}

/// A browser instance capable of opening independent tabs.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn open_tab(&self) -> anyhow::Result<std::sync::Arc<dyn BrowserTab>>;

    /// Releases the underlying browser process/connection. Called once by
    /// the engine facade on shutdown.
    async fn shutdown(&self) -> anyhow::Result<()>;
}
