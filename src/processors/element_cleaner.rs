//! ElementCleaner (priority 20): removes every element matching a CSS
//! selector from the DOM.

use async_trait::async_trait;
use serde::Deserialize;

use crate::frontier::Frontier;
use crate::page_context::{PageContext, PageState};
use crate::processor::{Processor, ProcessorSignal};

use super::PRIORITY_ELEMENT_CLEANER;

#[derive(Debug, Deserialize)]
struct RemovalResult {
    removed: u32,
    failed: u32,
}

/// Runs once, at the first tick where `page_state` is `Ready` or
/// `Completed`: removes every element matching `selector`. No matches is a
/// zero-tally success; removal raising on every candidate is `Cancelled`;
/// any partial removal still counts as success.
pub struct ElementCleaner {
    selector: String,
}

impl ElementCleaner {
    #[must_use]
    pub fn new(selector: String) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl Processor for ElementCleaner {
    fn name(&self) -> &str {
        "element_cleaner"
    }

    fn priority(&self) -> i32 {
        PRIORITY_ELEMENT_CLEANER
    }

    async fn detect(&mut self, ctx: &PageContext, _frontier: &Frontier) -> ProcessorSignal {
        match ctx.data().await.page_state {
            Some(PageState::Ready) | Some(PageState::Completed) => ProcessorSignal::Ready,
            _ => ProcessorSignal::Waiting,
        }
    }

    async fn run(&mut self, ctx: &PageContext, _frontier: &Frontier) -> anyhow::Result<ProcessorSignal> {
        let count = ctx.tab.query_selector_count(&self.selector).await?;
        if count == 0 {
            ctx.data().await.elements_removed = 0;
            return Ok(ProcessorSignal::Completed);
        }

        let script = format!(
            r#"(function(sel) {{
                let removed = 0, failed = 0;
                document.querySelectorAll(sel).forEach((el) => {{
                    try {{ el.remove(); removed += 1; }}
                    catch (e) {{ failed += 1; }}
                }});
                return {{ removed, failed }};
            }})({sel})"#,
            sel = serde_json::to_string(&self.selector)?
        );

        let value = ctx.tab.evaluate(&script).await?;
        let result: RemovalResult = serde_json::from_value(value)?;

        if result.removed == 0 && result.failed > 0 {
            return Ok(ProcessorSignal::Cancelled);
        }

        ctx.data().await.elements_removed += result.removed;
        Ok(ProcessorSignal::Completed)
    }

    async fn finish(&mut self, _ctx: &PageContext) -> anyhow::Result<()> {
        Ok(())
    }
}
