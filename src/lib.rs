//! Concurrent web-to-PDF harvesting engine.
//!
//! Given one or more seed URLs, [`Engine`] navigates a headless browser
//! through a bounded-fan-out [`Frontier`], applies a prioritized pipeline
//! of page-level [`processors`] to each reached page (monitoring, request
//! blocking, link discovery, DOM pruning, content isolation, PDF
//! rendering), and emits per-page PDF artifacts. Concatenating those
//! artifacts under page-count and byte-size bounds is a downstream
//! concern this crate does not implement.

pub mod browser;
pub mod browser_setup;
pub mod chromium;
pub mod config;
pub mod engine;
pub mod error;
pub mod frontier;
pub mod metrics;
pub mod page_context;
pub mod processor;
pub mod processors;
pub mod retry_gate;
pub mod scheduler;
pub mod util;

pub use browser::{BrowserDriver, BrowserTab, TabEvent, TabEventSink};
pub use browser_setup::{apply_stealth_measures, download_managed_browser, find_browser_executable, launch_browser};
pub use chromium::{ChromiumDriver, ChromiumTab};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{Engine, EngineReport};
pub use error::{EngineError, EngineResult};
pub use frontier::{Frontier, UrlEntity, UrlStatus};
pub use metrics::EngineMetrics;
pub use page_context::{PageContext, PageData, PageState};
pub use processor::{Processor, ProcessorSignal, ProcessorState};
pub use retry_gate::{NoRetry, RetryGate};
