//! ContentFinder (priority 30): isolates a single subtree as "the content"
//! by pruning every sibling branch on the path from the match up to
//! `<body>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::frontier::Frontier;
use crate::page_context::{PageContext, PageState};
use crate::processor::{Processor, ProcessorSignal};

use super::PRIORITY_CONTENT_FINDER;

/// Given `selector` and the set of `page_state`s that should trigger it
/// (default `{Ready, Completed}`): if `selector` matches nothing at
/// trigger time, `Cancelled`. Otherwise walks from the match up to `body`,
/// at each ancestor removing sibling elements of the current node, so only
/// the matched subtree survives. Sets `core_content_processed = true` on
/// success, including the "zero siblings to remove" case.
pub struct ContentFinder {
    selector: String,
    trigger_states: Vec<PageState>,
}

impl ContentFinder {
    #[must_use]
    pub fn new(selector: String, trigger_states: Vec<PageState>) -> Self {
        let trigger_states = if trigger_states.is_empty() {
            vec![PageState::Ready, PageState::Completed]
        } else {
            trigger_states
        };
        Self { selector, trigger_states }
    }
}

#[async_trait]
impl Processor for ContentFinder {
    fn name(&self) -> &str {
        "content_finder"
    }

    fn priority(&self) -> i32 {
        PRIORITY_CONTENT_FINDER
    }

    async fn detect(&mut self, ctx: &PageContext, _frontier: &Frontier) -> ProcessorSignal {
        match ctx.data().await.page_state {
            Some(state) if self.trigger_states.contains(&state) => ProcessorSignal::Ready,
            _ => ProcessorSignal::Waiting,
        }
    }

    async fn run(&mut self, ctx: &PageContext, _frontier: &Frontier) -> anyhow::Result<ProcessorSignal> {
        let count = ctx.tab.query_selector_count(&self.selector).await?;
        if count == 0 {
            return Ok(ProcessorSignal::Cancelled);
        }

        let script = format!(
            r#"(function(sel) {{
                let el = document.querySelector(sel);
                if (!el) return null;
                let node = el;
                while (node && node !== document.body && node.parentElement) {{
                    const parent = node.parentElement;
                    Array.from(parent.children).forEach((sib) => {{
                        if (sib !== node) {{ sib.remove(); }}
                    }});
                    node = parent;
                }}
                return document.body ? document.body.textContent.length : 0;
            }})({sel})"#,
            sel = serde_json::to_string(&self.selector)?
        );

        let value = ctx.tab.evaluate(&script).await?;
        let content_length = match value {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            _ => 0,
        };

        let mut data = ctx.data().await;
        data.core_content_processed = true;
        data.content_length = content_length;
        Ok(ProcessorSignal::Completed)
    }

    async fn finish(&mut self, _ctx: &PageContext) -> anyhow::Result<()> {
        Ok(())
    }
}
