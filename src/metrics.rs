//! Metrics Surface (C7): read-only export of engine counters and gauges.
//!
//! Lock-free atomics plus label-keyed `DashMap`s for the per-domain/
//! per-processor breakdowns. No external metrics crate: this facade is
//! constructed and injected by the caller, never reached into as global
//! state, so a dependency on a metrics-exporter format would be premature.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::frontier::UrlStatus;
use crate::processor::ProcessorSignal;

const DURATION_BUCKETS_MS: [u64; 8] = [100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];
const SIZE_BUCKETS_BYTES: [u64; 7] = [1_024, 10_240, 102_400, 512_000, 1_048_576, 5_242_880, 10_485_760];

/// A fixed-bucket duration histogram: no external metrics crate, just
/// monotonic counters per upper bound plus an overflow bucket.
#[derive(Debug, Default)]
pub struct DurationHistogram {
    buckets: [AtomicU64; DURATION_BUCKETS_MS.len()],
    overflow: AtomicU64,
    count: AtomicU64,
    sum_ms: AtomicU64,
}

impl DurationHistogram {
    pub fn observe(&self, duration: std::time::Duration) {
        let ms = duration.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(ms, Ordering::Relaxed);

        match DURATION_BUCKETS_MS.iter().position(|&bound| ms <= bound) {
            Some(idx) => {
                self.buckets[idx].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            bucket_bounds: DURATION_BUCKETS_MS.to_vec(),
            bucket_counts: self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect(),
            overflow: self.overflow.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
            sum: self.sum_ms.load(Ordering::Relaxed),
        }
    }
}

/// A fixed-bucket byte-size histogram, same shape as [`DurationHistogram`].
#[derive(Debug, Default)]
pub struct SizeHistogram {
    buckets: [AtomicU64; SIZE_BUCKETS_BYTES.len()],
    overflow: AtomicU64,
    count: AtomicU64,
    sum_bytes: AtomicU64,
}

impl SizeHistogram {
    pub fn observe(&self, bytes: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_bytes.fetch_add(bytes, Ordering::Relaxed);

        match SIZE_BUCKETS_BYTES.iter().position(|&bound| bytes <= bound) {
            Some(idx) => {
                self.buckets[idx].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            bucket_bounds: SIZE_BUCKETS_BYTES.to_vec(),
            bucket_counts: self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect(),
            overflow: self.overflow.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
            sum: self.sum_bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    pub bucket_bounds: Vec<u64>,
    pub bucket_counts: Vec<u64>,
    pub overflow: u64,
    pub count: u64,
    pub sum: u64,
}

/// The engine's full counter/gauge surface. Every method takes `&self` and
/// returns nothing the caller's control flow branches on — observability
/// only.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    urls_by_status: DashMap<UrlStatus, AtomicU64>,
    page_duration: DashMap<(UrlStatus, String), DurationHistogram>,
    page_content_size: SizeHistogram,
    live_tabs: AtomicUsize,
    processor_transitions: DashMap<(String, ProcessorSignalKey, &'static str), AtomicU64>,
    errors: DashMap<(&'static str, &'static str), AtomicU64>,
    slow_requests: AtomicU64,
    failed_requests: AtomicU64,
}

/// `ProcessorSignal` has no `Hash`/`Eq` of its own reason to carry one just
/// for metrics keys, so it's mapped to this small copyable key type at the
/// recording boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorSignalKey {
    Waiting,
    Ready,
    Running,
    Completed,
    Cancelled,
}

impl From<ProcessorSignal> for ProcessorSignalKey {
    fn from(signal: ProcessorSignal) -> Self {
        match signal {
            ProcessorSignal::Waiting => Self::Waiting,
            ProcessorSignal::Ready => Self::Ready,
            ProcessorSignal::Running => Self::Running,
            ProcessorSignal::Completed => Self::Completed,
            ProcessorSignal::Cancelled => Self::Cancelled,
        }
    }
}

impl EngineMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_url_status_count(&self, status: UrlStatus, count: u64) {
        self.urls_by_status
            .entry(status)
            .or_insert_with(|| AtomicU64::new(0))
            .store(count, Ordering::Relaxed);
    }

    pub fn record_page_duration(&self, status: UrlStatus, domain: &str, duration: std::time::Duration) {
        self.page_duration
            .entry((status, domain.to_string()))
            .or_default()
            .observe(duration);
    }

    pub fn record_page_content_size(&self, bytes: u64) {
        self.page_content_size.observe(bytes);
    }

    pub fn set_live_tabs(&self, count: usize) {
        self.live_tabs.store(count, Ordering::Relaxed);
    }

    pub fn record_processor_transition(&self, processor_name: &str, signal: ProcessorSignal, result: &'static str) {
        self.processor_transitions
            .entry((processor_name.to_string(), signal.into(), result))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, error_type: &'static str, component: &'static str) {
        self.errors
            .entry((error_type, component))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_slow_request(&self) {
        self.slow_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_request(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            urls_by_status: self
                .urls_by_status
                .iter()
                .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
                .collect(),
            live_tabs: self.live_tabs.load(Ordering::Relaxed),
            slow_requests: self.slow_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            page_content_size: self.page_content_size.snapshot(),
        }
    }
}

/// An immutable point-in-time view of the subset of [`EngineMetrics`] worth
/// surfacing in an [`crate::engine::EngineReport`]. The label-keyed maps
/// stay behind `EngineMetrics` itself for callers who want the full detail.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub urls_by_status: Vec<(UrlStatus, u64)>,
    pub live_tabs: usize,
    pub slow_requests: u64,
    pub failed_requests: u64,
    pub page_content_size: HistogramSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_histogram_buckets_by_upper_bound() {
        let hist = DurationHistogram::default();
        hist.observe(std::time::Duration::from_millis(50));
        hist.observe(std::time::Duration::from_millis(5_000));
        hist.observe(std::time::Duration::from_secs(120));

        let snap = hist.snapshot();
        assert_eq!(snap.count, 3);
        assert_eq!(snap.overflow, 1);
    }

    #[test]
    fn url_status_gauge_reflects_latest_set() {
        let metrics = EngineMetrics::new();
        metrics.set_url_status_count(UrlStatus::Pending, 4);
        metrics.set_url_status_count(UrlStatus::Pending, 2);

        let snap = metrics.snapshot();
        assert_eq!(
            snap.urls_by_status.iter().find(|(s, _)| *s == UrlStatus::Pending).map(|(_, c)| *c),
            Some(2)
        );
    }

    #[test]
    fn processor_transitions_accumulate_per_signal_and_result() {
        let metrics = EngineMetrics::new();
        metrics.record_processor_transition("links_finder", ProcessorSignal::Ready, "detect");
        metrics.record_processor_transition("links_finder", ProcessorSignal::Ready, "detect");
        metrics.record_processor_transition("links_finder", ProcessorSignal::Ready, "continue");

        let detect_key = ("links_finder".to_string(), ProcessorSignalKey::Ready, "detect");
        let continue_key = ("links_finder".to_string(), ProcessorSignalKey::Ready, "continue");
        assert_eq!(
            metrics.processor_transitions.get(&detect_key).map(|v| v.load(Ordering::Relaxed)),
            Some(2),
            "detect and continue results are kept distinct, not folded together"
        );
        assert_eq!(
            metrics.processor_transitions.get(&continue_key).map(|v| v.load(Ordering::Relaxed)),
            Some(1)
        );
    }
}
