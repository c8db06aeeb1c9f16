//! Test doubles for `BrowserTab`/`BrowserDriver`, letting the scheduler
//! and processor pipeline run end-to-end with no real browser involved.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use pdf_harvest_engine::{BrowserDriver, BrowserTab, TabEvent, TabEventSink};

/// A scripted response set a `MockTab` reports once navigated to a given
/// URL.
#[derive(Clone)]
pub struct MockPage {
    pub title: Option<String>,
    pub links: Vec<String>,
    pub content_selector_count: usize,
    pub clean_selector_count: usize,
    pub fail_navigate: bool,
    pub fail_pdf: bool,
}

impl Default for MockPage {
    /// A page that completes the whole pipeline successfully: a non-empty
    /// title (so `PdfExporter`'s fallback trigger fires even with no
    /// content-selector match), no links, nothing to clean.
    fn default() -> Self {
        Self {
            title: Some("untitled".to_string()),
            links: Vec::new(),
            content_selector_count: 0,
            clean_selector_count: 0,
            fail_navigate: false,
            fail_pdf: false,
        }
    }
}

struct MockTabState {
    pages: Arc<Mutex<HashMap<String, MockPage>>>,
    current_url: Mutex<String>,
    sink: Mutex<Option<Arc<dyn TabEventSink>>>,
    closed: AtomicUsize,
    rendered_pdfs: Mutex<Vec<PathBuf>>,
}

impl MockTabState {
    fn page(&self) -> MockPage {
        let url = self.current_url.lock().unwrap().clone();
        self.pages.lock().unwrap().get(&url).cloned().unwrap_or_default()
    }
}

/// An in-memory stand-in for a headless-Chrome tab. `evaluate` recognizes
/// the handful of JS shapes this crate's processors actually send (link
/// collection, element removal, content pruning) well enough to return
/// matching JSON without a real DOM.
pub struct MockTab {
    state: Arc<MockTabState>,
}

impl MockTab {
    fn new(pages: Arc<Mutex<HashMap<String, MockPage>>>) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(MockTabState {
                pages,
                current_url: Mutex::new(String::new()),
                sink: Mutex::new(None),
                closed: AtomicUsize::new(0),
                rendered_pdfs: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Delivers a synthetic `Load` event, simulating the point at which a
    /// real driver's event stream would tell `PageMonitor` the page fired
    /// its load event.
    pub fn fire_load(&self) {
        if let Some(sink) = self.state.sink.lock().unwrap().clone() {
            sink.on_event(TabEvent::Load);
        }
    }

    #[must_use]
    pub fn rendered_pdfs(&self) -> Vec<PathBuf> {
        self.state.rendered_pdfs.lock().unwrap().clone()
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserTab for MockTab {
    async fn navigate(&self, url: &str, _timeout: Duration) -> anyhow::Result<()> {
        *self.state.current_url.lock().unwrap() = url.to_string();
        if self.state.page().fail_navigate {
            anyhow::bail!("mock navigation failure");
        }
        Ok(())
    }

    async fn current_url(&self) -> anyhow::Result<String> {
        Ok(self.state.current_url.lock().unwrap().clone())
    }

    async fn ready_state(&self) -> anyhow::Result<String> {
        Ok("complete".to_string())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn evaluate(&self, js_source: &str) -> anyhow::Result<Value> {
        let page = self.state.page();
        if js_source.contains("hrefs") {
            return Ok(json!({ "hrefs": page.links }));
        }
        if js_source.contains("removed") {
            return Ok(json!({ "removed": page.clean_selector_count, "failed": 0 }));
        }
        // ContentFinder's pruning script returns a content length.
        Ok(json!(page.content_selector_count as u64 * 100))
    }

    async fn query_selector_count(&self, _selector: &str) -> anyhow::Result<usize> {
        let page = self.state.page();
        Ok(page.content_selector_count.max(page.clean_selector_count))
    }

    async fn page_title(&self) -> anyhow::Result<Option<String>> {
        Ok(self.state.page().title)
    }

    async fn install_observer(&self, sink: Arc<dyn TabEventSink>) -> anyhow::Result<()> {
        *self.state.sink.lock().unwrap() = Some(sink);
        self.fire_load();
        Ok(())
    }

    async fn install_block_pattern(&self, _pattern: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn abort_request(&self, _request_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn render_pdf(&self, path: &Path) -> anyhow::Result<()> {
        if self.state.page().fail_pdf {
            anyhow::bail!("mock pdf render failure");
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"%PDF-1.4 mock")?;
        self.state.rendered_pdfs.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn screenshot(&self, _path: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A `BrowserDriver` backed by a shared `url -> MockPage` script. Every
/// opened tab reads from the same script, keyed by whatever URL it is
/// later navigated to, so link-discovery tests (where the scheduler opens
/// tabs for URLs not known up front) resolve correctly.
pub struct MockDriver {
    pages: Arc<Mutex<HashMap<String, MockPage>>>,
    opened: Mutex<Vec<Arc<MockTab>>>,
}

impl MockDriver {
    #[must_use]
    pub fn new(pages: HashMap<String, MockPage>) -> Arc<Self> {
        Arc::new(Self {
            pages: Arc::new(Mutex::new(pages)),
            opened: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn opened_tabs(&self) -> Vec<Arc<MockTab>> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn open_tab(&self) -> anyhow::Result<Arc<dyn BrowserTab>> {
        let tab = MockTab::new(Arc::clone(&self.pages));
        self.opened.lock().unwrap().push(Arc::clone(&tab));
        Ok(tab)
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
