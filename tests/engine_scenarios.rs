//! Black-box scenarios driving the whole `Engine` through `MockDriver`/
//! `MockTab`, no real browser involved.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::{MockDriver, MockPage};
use pdf_harvest_engine::{Engine, EngineConfig, UrlStatus};

fn test_config(dir: &std::path::Path, entry: &str) -> EngineConfig {
    EngineConfig::builder()
        .output_dir(dir)
        .entry_urls([entry])
        .max_concurrent_tabs(3)
        .page_timeout(Duration::from_millis(200))
        .poll_interval(Duration::from_millis(1))
        .detect_timeout(Duration::from_millis(50))
        .build()
        .expect("valid config")
}

#[tokio::test]
async fn single_page_produces_one_pdf() {
    let tmp = tempfile::tempdir().expect("tmpdir");
    let entry = "https://example.org/";
    let config = test_config(tmp.path(), entry);

    let mut pages = HashMap::new();
    pages.insert(entry.to_string(), MockPage::default());
    let driver = MockDriver::new(pages);

    let engine = Engine::new(config, driver, None).expect("engine builds");
    let report = engine.run().await.expect("run succeeds");

    assert_eq!(report.pdf_paths.len(), 1, "exactly one pdf produced");
    assert!(report.pdf_paths[0].exists(), "pdf file actually written");
    assert_eq!(*report.url_counts.get(&UrlStatus::Visited).unwrap_or(&0), 1);
    assert_eq!(*report.url_counts.get(&UrlStatus::Failed).unwrap_or(&0), 0);
}

#[tokio::test]
async fn discovered_links_expand_the_frontier_within_depth() {
    let tmp = tempfile::tempdir().expect("tmpdir");
    let entry = "https://example.org/";
    let child = "https://example.org/a";
    let config = test_config(tmp.path(), entry);

    let mut pages = HashMap::new();
    pages.insert(
        entry.to_string(),
        MockPage { links: vec![child.to_string()], ..MockPage::default() },
    );
    pages.insert(child.to_string(), MockPage::default());
    let driver = MockDriver::new(pages);

    let engine = Engine::new(config, driver, None).expect("engine builds");
    let report = engine.run().await.expect("run succeeds");

    assert_eq!(report.pdf_paths.len(), 2, "entry + discovered link both harvested");
    assert_eq!(*report.url_counts.get(&UrlStatus::Visited).unwrap_or(&0), 2);
}

#[tokio::test]
async fn links_outside_url_patterns_are_not_admitted() {
    let tmp = tempfile::tempdir().expect("tmpdir");
    let entry = "https://example.org/";
    let offsite = "https://other.org/x";
    let config = EngineConfig::builder()
        .output_dir(tmp.path())
        .entry_urls([entry])
        .max_concurrent_tabs(3)
        .page_timeout(Duration::from_millis(200))
        .poll_interval(Duration::from_millis(1))
        .detect_timeout(Duration::from_millis(50))
        .url_patterns([r"^https://example\.org/.*$"])
        .build()
        .expect("valid config");

    let mut pages = HashMap::new();
    pages.insert(
        entry.to_string(),
        MockPage { links: vec![offsite.to_string()], ..MockPage::default() },
    );
    let driver = MockDriver::new(pages);

    let engine = Engine::new(config, driver, None).expect("engine builds");
    let report = engine.run().await.expect("run succeeds");

    assert_eq!(report.pdf_paths.len(), 1, "offsite link never admitted to the frontier");
    assert!(engine.frontier().by_url(offsite).is_none());
}

#[tokio::test]
async fn navigation_failure_marks_the_url_failed() {
    let tmp = tempfile::tempdir().expect("tmpdir");
    let entry = "https://example.org/";
    let config = test_config(tmp.path(), entry);

    let mut pages = HashMap::new();
    pages.insert(entry.to_string(), MockPage { fail_navigate: true, ..MockPage::default() });
    let driver = MockDriver::new(pages);

    let engine = Engine::new(config, driver, None).expect("engine builds");
    let report = engine.run().await.expect("run succeeds even with a failed page");

    assert_eq!(report.pdf_paths.len(), 0);
    assert_eq!(*report.url_counts.get(&UrlStatus::Failed).unwrap_or(&0), 1);
}

#[tokio::test]
async fn pdf_render_failure_leaves_no_pdf_path_but_still_finalizes() {
    let tmp = tempfile::tempdir().expect("tmpdir");
    let entry = "https://example.org/";
    let config = test_config(tmp.path(), entry);

    let mut pages = HashMap::new();
    pages.insert(entry.to_string(), MockPage { fail_pdf: true, ..MockPage::default() });
    let driver = MockDriver::new(pages);

    let engine = Engine::new(config, driver, None).expect("engine builds");
    let report = engine.run().await.expect("run succeeds");

    assert_eq!(report.pdf_paths.len(), 0, "failed render produces no artifact");
    // The page still finalizes (no partial-pdf recovery, but also no hang).
    assert_eq!(*report.url_counts.get(&UrlStatus::Visited).unwrap_or(&0), 1);
}

#[tokio::test]
async fn concurrent_fan_out_respects_max_concurrent_tabs() {
    let tmp = tempfile::tempdir().expect("tmpdir");
    let entry = "https://example.org/";
    let mut links = Vec::new();
    for i in 0..6 {
        links.push(format!("https://example.org/{i}"));
    }

    let config = EngineConfig::builder()
        .output_dir(tmp.path())
        .entry_urls([entry])
        .max_concurrent_tabs(2)
        .page_timeout(Duration::from_millis(300))
        .poll_interval(Duration::from_millis(1))
        .detect_timeout(Duration::from_millis(50))
        .build()
        .expect("valid config");

    let mut pages = HashMap::new();
    pages.insert(entry.to_string(), MockPage { links: links.clone(), ..MockPage::default() });
    for link in &links {
        pages.insert(link.clone(), MockPage::default());
    }
    let driver = MockDriver::new(pages);

    let engine = Engine::new(config, driver, None).expect("engine builds");
    let report = engine.run().await.expect("run succeeds");

    assert_eq!(report.pdf_paths.len(), 7, "entry plus all six discovered links harvested");
}
