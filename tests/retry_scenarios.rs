//! Retry Gate integration: a timed-out page is marked FAILED, and a
//! `RetryGate` that says yes promotes it back to PENDING for another pass.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{MockDriver, MockPage};
use pdf_harvest_engine::{Engine, EngineConfig, RetryGate, UrlEntity, UrlStatus};

/// Retries exactly once: says yes to the first idle consultation, no to
/// every one after, so the scheduler doesn't loop forever against a page
/// that keeps failing the same way.
struct RetryOnce {
    attempts: AtomicUsize,
}

impl RetryGate for RetryOnce {
    fn should_retry(&self, _failed: &[UrlEntity]) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst) == 0
    }
}

#[tokio::test]
async fn failed_page_is_retried_once_then_left_failed() {
    let tmp = tempfile::tempdir().expect("tmpdir");
    let entry = "https://example.org/";

    let config = EngineConfig::builder()
        .output_dir(tmp.path())
        .entry_urls([entry])
        .max_concurrent_tabs(1)
        .page_timeout(Duration::from_millis(200))
        .poll_interval(Duration::from_millis(1))
        .detect_timeout(Duration::from_millis(50))
        .build()
        .expect("valid config");

    let mut pages = HashMap::new();
    pages.insert(entry.to_string(), MockPage { fail_navigate: true, ..MockPage::default() });
    let driver = MockDriver::new(pages);

    let retry_gate = Arc::new(RetryOnce { attempts: AtomicUsize::new(0) });
    let engine = Engine::new(config, driver, Some(retry_gate.clone()))
        .expect("engine builds");
    let report = engine.run().await.expect("run succeeds");

    assert_eq!(*report.url_counts.get(&UrlStatus::Failed).unwrap_or(&0), 1);
    assert!(
        retry_gate.attempts.load(Ordering::SeqCst) >= 2,
        "gate consulted at least twice: once to grant the retry, once to decline further ones"
    );
}
