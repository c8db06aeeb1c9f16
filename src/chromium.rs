//! The one real [`BrowserTab`]/[`BrowserDriver`] implementation, backed by
//! chromiumoxide.
//!
//! Uses `browser_setup::launch_browser` for process setup and the same
//! evaluate/screenshot call pattern throughout
//! (`page.evaluate(..).await?.into_value()`). PDF export and request
//! interception follow chromiumoxide's CDP domain conventions (`Page::pdf`
//! mirrors `Page::screenshot`; the `Fetch` domain mirrors the
//! event-subscription pattern chromiumoxide uses everywhere else).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams, NetworkErrorReason, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, PrintToPdfParams};
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::browser::{BrowserDriver, BrowserTab, TabEvent, TabEventSink};
use crate::browser_setup::{apply_stealth_measures, launch_browser};

/// A tab wrapping a chromiumoxide [`Page`], plus the background tasks that
/// keep its event sinks and block patterns current.
pub struct ChromiumTab {
    page: Page,
    block_patterns: Arc<RwLock<Vec<String>>>,
    event_task: RwLock<Option<JoinHandle<()>>>,
    fetch_task: RwLock<Option<JoinHandle<()>>>,
}

impl ChromiumTab {
    async fn new(page: Page) -> anyhow::Result<Self> {
        apply_stealth_measures(&page).await?;
        Ok(Self {
            page,
            block_patterns: Arc::new(RwLock::new(Vec::new())),
            event_task: RwLock::new(None),
            fetch_task: RwLock::new(None),
        })
    }

    /// Starts the Fetch-domain interception task the first time a block
    /// pattern is installed. Idempotent: later calls are no-ops.
    async fn ensure_fetch_interception(&self) -> anyhow::Result<()> {
        if self.fetch_task.read().is_some() {
            return Ok(());
        }

        self.page
            .execute(FetchEnableParams {
                patterns: Some(vec![RequestPattern {
                    url_pattern: Some("*".to_string()),
                    resource_type: None,
                    request_stage: None,
                }]),
                handle_auth_requests: Some(false),
            })
            .await?;

        let mut paused = self.page.event_listener::<EventRequestPaused>().await?;
        let client = self.page.clone();
        let patterns = Arc::clone(&self.block_patterns);

        let handle = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let url = event.request.url.as_str();
                let blocked = patterns.read().iter().any(|p| url_matches_pattern(url, p));

                let result = if blocked {
                    client
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            NetworkErrorReason::BlockedByClient,
                        ))
                        .await
                } else {
                    client
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                };

                if let Err(e) = result {
                    tracing::trace!("fetch interception continue/fail failed: {e}");
                }
            }
        });

        *self.fetch_task.write() = Some(handle);
        Ok(())
    }
}

/// Minimal glob-style matcher: `*` matches any run of characters, everything
/// else is a literal substring test. Matches the block-pattern semantics
/// `RequestMonitor` documents (substring or simple wildcard).
fn url_matches_pattern(url: &str, pattern: &str) -> bool {
    if !pattern.contains('*') {
        return url.contains(pattern);
    }

    let mut rest = url;
    for part in pattern.split('*') {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

#[async_trait]
impl BrowserTab for ChromiumTab {
    async fn navigate(&self, url: &str, timeout: Duration) -> anyhow::Result<()> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| anyhow::anyhow!("navigation to {url} timed out after {timeout:?}"))??;
        Ok(())
    }

    async fn current_url(&self) -> anyhow::Result<String> {
        self.page
            .url()
            .await?
            .ok_or_else(|| anyhow::anyhow!("tab has no current url"))
    }

    async fn ready_state(&self) -> anyhow::Result<String> {
        let result = self.page.evaluate("document.readyState").await?;
        result
            .into_value::<String>()
            .map_err(|e| anyhow::anyhow!("readyState was not a string: {e}"))
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> anyhow::Result<bool> {
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(_)) | Err(_) => Ok(false),
        }
    }

    async fn evaluate(&self, js_source: &str) -> anyhow::Result<Value> {
        let result = self
            .page
            .evaluate(js_source)
            .await
            .map_err(|e| anyhow::anyhow!("evaluate failed: {e}"))?;
        result
            .into_value::<Value>()
            .map_err(|e| anyhow::anyhow!("evaluate result was not representable as JSON: {e}"))
    }

    async fn query_selector_count(&self, selector: &str) -> anyhow::Result<usize> {
        let script = format!("document.querySelectorAll({selector:?}).length");
        let result = self.page.evaluate(script).await?;
        Ok(result.into_value::<usize>().unwrap_or(0))
    }

    async fn page_title(&self) -> anyhow::Result<Option<String>> {
        Ok(self.page.get_title().await?)
    }

    async fn install_observer(&self, sink: Arc<dyn TabEventSink>) -> anyhow::Result<()> {
        let mut request_will_be_sent = self.page.event_listener::<EventRequestWillBeSent>().await?;
        let mut response_received = self.page.event_listener::<EventResponseReceived>().await?;
        let mut loading_failed = self.page.event_listener::<EventLoadingFailed>().await?;
        let mut load_fired = self.page.event_listener::<EventLoadEventFired>().await?;

        let sink_a = Arc::clone(&sink);
        let sink_b = Arc::clone(&sink);
        let sink_c = Arc::clone(&sink);
        let sink_d = Arc::clone(&sink);

        let h1 = tokio::spawn(async move {
            while let Some(ev) = request_will_be_sent.next().await {
                sink_a.on_event(TabEvent::RequestStarted {
                    request_id: ev.request_id.inner().clone(),
                    url: ev.request.url.clone(),
                });
            }
        });
        let h2 = tokio::spawn(async move {
            while let Some(ev) = response_received.next().await {
                sink_b.on_event(TabEvent::ResponseReceived {
                    request_id: ev.request_id.inner().clone(),
                    url: ev.response.url.clone(),
                });
            }
        });
        let h3 = tokio::spawn(async move {
            while let Some(ev) = loading_failed.next().await {
                sink_c.on_event(TabEvent::RequestFailed {
                    request_id: ev.request_id.inner().clone(),
                    url: String::new(),
                    reason: ev.error_text.clone(),
                });
            }
        });
        let h4 = tokio::spawn(async move {
            while load_fired.next().await.is_some() {
                sink_d.on_event(TabEvent::Load);
            }
        });

        // Detached: the tab's lifetime owns these indirectly through the
        // page's own event-bus shutdown when the page closes.
        drop((h1, h2, h3, h4));
        Ok(())
    }

    async fn install_block_pattern(&self, pattern: &str) -> anyhow::Result<()> {
        self.ensure_fetch_interception().await?;
        let mut patterns = self.block_patterns.write();
        if !patterns.iter().any(|p| p == pattern) {
            patterns.push(pattern.to_string());
        }
        Ok(())
    }

    async fn abort_request(&self, _request_id: &str) -> anyhow::Result<()> {
        // Handled implicitly: once a pattern is installed, the Fetch
        // interception task fails any subsequent paused request matching
        // it. In-flight requests already past the pause checkpoint cannot
        // be aborted retroactively through this domain.
        Ok(())
    }

    async fn render_pdf(&self, path: &Path) -> anyhow::Result<()> {
        let params = PrintToPdfParams {
            print_background: Some(true),
            paper_width: Some(8.27),
            paper_height: Some(11.69),
            margin_top: Some(0.4),
            margin_bottom: Some(0.4),
            margin_left: Some(0.4),
            margin_right: Some(0.4),
            prefer_css_page_size: Some(false),
            ..Default::default()
        };

        let pdf_data = self
            .page
            .pdf(params)
            .await
            .map_err(|e| anyhow::anyhow!("pdf render failed: {e}"))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, pdf_data).await?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> anyhow::Result<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        let data = self
            .page
            .screenshot(params)
            .await
            .map_err(|e| anyhow::anyhow!("screenshot failed: {e}"))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.page.close().await.map_err(|e| anyhow::anyhow!("close failed: {e}"))
    }
}

/// A launched Chromium process, capable of opening independent tabs.
pub struct ChromiumDriver {
    browser: tokio::sync::Mutex<chromiumoxide::Browser>,
    handler_task: JoinHandle<()>,
    #[allow(dead_code)]
    user_data_dir: std::path::PathBuf,
}

impl ChromiumDriver {
    /// Finds or downloads Chromium and launches it headless/headed per
    /// `headless`, optionally reusing `chrome_data_dir` as its profile.
    pub async fn launch(
        headless: bool,
        chrome_data_dir: Option<std::path::PathBuf>,
    ) -> anyhow::Result<Self> {
        let (browser, handler_task, user_data_dir) = launch_browser(headless, chrome_data_dir).await?;
        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            handler_task,
            user_data_dir,
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn open_tab(&self) -> anyhow::Result<Arc<dyn BrowserTab>> {
        let page = self.browser.lock().await.new_page("about:blank").await?;
        let tab = ChromiumTab::new(page).await?;
        Ok(Arc::new(tab))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.browser.lock().await.close().await.ok();
        self.handler_task.abort();
        Ok(())
    }
}
