//! Processor Contract (C3): the detect/run/finish state machine every
//! pipeline stage implements, plus the scheduler-owned state each processor
//! instance carries across ticks.

use async_trait::async_trait;

use crate::frontier::Frontier;
use crate::page_context::PageContext;

/// Outcome of a `detect` call — what the scheduler should do with this
/// processor on the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorSignal {
    /// Not yet eligible; the scheduler will re-poll on the next tick.
    Waiting,
    /// Please run me now.
    Ready,
    /// Already mid-work, wishes to continue across ticks.
    Running,
    /// Nothing more to do, safe to finish.
    Completed,
    /// Give up on this page for this processor; do not finish.
    Cancelled,
}

/// The scheduler-owned lifecycle state of one processor instance within one
/// [`PageContext`]. Transitions are driven by the scheduler, never by the
/// processor itself, except that `run` may report `Running` (continue) or
/// `Completed`/`Cancelled` (self-terminate) via its return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Waiting,
    Ready,
    Running,
    Completed,
    Finished,
    Cancelled,
}

impl ProcessorState {
    /// Once `Finished` or `Cancelled`, no further `detect`/`run`/`finish`
    /// call is ever issued for the owning processor instance.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessorState::Finished | ProcessorState::Cancelled)
    }
}

/// A pipeline stage. Implementors must be entirely free of chromiumoxide
/// types in their public signatures — all browser interaction goes through
/// [`crate::browser::BrowserTab`], which [`PageContext`] carries — so that
/// the contract itself is testable against a mock tab.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Stable, unique-within-a-page-context name.
    fn name(&self) -> &str;

    /// Smaller runs earlier (detect/run), later finishes (finish runs in
    /// descending-priority order).
    fn priority(&self) -> i32;

    /// Pure observer with a deadline enforced by the scheduler
    /// (`detect_timeout`), not by the implementation. Must not mutate
    /// `ctx` except for incidental bookkeeping private to the processor
    /// instance (e.g. "have I already run my Ready-at-Completed pass").
    async fn detect(&mut self, ctx: &PageContext, frontier: &Frontier) -> ProcessorSignal;

    /// Executes the processor's effect. Invoked only when the previous
    /// `detect` returned `Ready`, or to continue a `Running` processor.
    /// May mutate `ctx`'s data bag (via its interior `Mutex`, shared with
    /// the Request Observer's callback task) and `frontier`. Wrapped by
    /// the scheduler in the page-level timeout budget, not an individual
    /// deadline.
    async fn run(&mut self, ctx: &PageContext, frontier: &Frontier) -> anyhow::Result<ProcessorSignal>;

    /// One-shot cleanup, invoked at most once, only after the processor
    /// reached `Completed`. Errors are logged by the scheduler and never
    /// propagate into the tab's VISITED/FAILED outcome.
    async fn finish(&mut self, ctx: &PageContext) -> anyhow::Result<()>;
}
