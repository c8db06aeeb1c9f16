//! LinksFinder (priority 10): discovers in-page links within a CSS
//! selector's subtree and feeds survivors back into the Frontier.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::frontier::{Frontier, UrlEntity};
use crate::page_context::{DiscoveredLink, PageContext, PageState};
use crate::processor::{Processor, ProcessorSignal};
use crate::util::depth_relative_to;

use super::{PRIORITY_LINKS_FINDER, now_ms};

#[derive(Debug, Deserialize)]
struct RawLinks {
    hrefs: Vec<String>,
}

/// Discovers anchor hrefs within `selector`'s subtree (including the
/// selector element itself if it is an anchor), resolves them against the
/// tab's current URL, and admits survivors to the Frontier as `PENDING`
/// items in category `"discovered"`.
///
/// Runs at most twice per page: once when `page_state` first reaches
/// `Ready`, once when it reaches `Completed` — each pass is remembered on
/// the instance so neither ever re-fires.
pub struct LinksFinder {
    selector: String,
    patterns: Vec<Regex>,
    entry_dirs: Vec<Url>,
    max_depth: u8,
    ready_pass_done: bool,
    completed_pass_done: bool,
}

impl LinksFinder {
    #[must_use]
    pub fn new(selector: String, patterns: Vec<Regex>, entry_dirs: Vec<Url>, max_depth: u8) -> Self {
        Self {
            selector,
            patterns,
            entry_dirs,
            max_depth,
            ready_pass_done: false,
            completed_pass_done: false,
        }
    }

    fn included(&self, url: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.is_match(url))
    }

    fn within_depth(&self, url: &Url) -> bool {
        if self.entry_dirs.is_empty() {
            return true;
        }
        self.entry_dirs
            .iter()
            .filter_map(|dir| depth_relative_to(url, dir))
            .min()
            .is_some_and(|depth| depth <= self.max_depth as usize)
    }

    async fn execute_pass(&self, ctx: &PageContext, frontier: &Frontier) -> anyhow::Result<()> {
        let script = format!(
            r#"(function(sel) {{
                const seen = new Set();
                const hrefs = [];
                const collect = (el) => {{
                    if (el.tagName === 'A' && el.hasAttribute('href') && !seen.has(el)) {{
                        seen.add(el);
                        hrefs.push(el.getAttribute('href'));
                    }}
                    el.querySelectorAll('a[href]').forEach((a) => {{
                        if (!seen.has(a)) {{
                            seen.add(a);
                            hrefs.push(a.getAttribute('href'));
                        }}
                    }});
                }};
                document.querySelectorAll(sel).forEach(collect);
                return {{ hrefs }};
            }})({sel})"#,
            sel = serde_json::to_string(&self.selector)?
        );

        let value = ctx.tab.evaluate(&script).await?;
        let raw: RawLinks = serde_json::from_value(value)?;

        let current_url = ctx.tab.current_url().await.ok();
        let base = current_url.as_deref().and_then(|u| Url::parse(u).ok());

        let mut data = ctx.data().await;
        for href in raw.hrefs {
            let Some(resolved) = resolve(&href, base.as_ref()) else {
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            if !self.within_depth(&resolved) {
                continue;
            }
            let absolute = resolved.to_string();
            if !self.included(&absolute) {
                continue;
            }

            let Some(entity) = UrlEntity::new(&absolute, "discovered") else {
                continue;
            };
            let added = frontier.add(entity);
            data.discovered_links.push(DiscoveredLink {
                url: absolute.clone(),
                discovered_at_ms: now_ms(),
                selector: self.selector.clone(),
            });
            if !added {
                debug!("discovered url already known: {absolute}");
            }
        }
        Ok(())
    }
}

fn resolve(href: &str, base: Option<&Url>) -> Option<Url> {
    match Url::parse(href) {
        Ok(url) => Some(url),
        Err(_) => base.and_then(|b| b.join(href).ok()),
    }
}

#[async_trait]
impl Processor for LinksFinder {
    fn name(&self) -> &str {
        "links_finder"
    }

    fn priority(&self) -> i32 {
        PRIORITY_LINKS_FINDER
    }

    async fn detect(&mut self, ctx: &PageContext, _frontier: &Frontier) -> ProcessorSignal {
        let page_state = ctx.data().await.page_state;
        match page_state {
            Some(PageState::Ready) if !self.ready_pass_done => ProcessorSignal::Ready,
            Some(PageState::Completed) if !self.completed_pass_done => ProcessorSignal::Ready,
            Some(PageState::Completed) => ProcessorSignal::Completed,
            _ => ProcessorSignal::Running,
        }
    }

    async fn run(&mut self, ctx: &PageContext, frontier: &Frontier) -> anyhow::Result<ProcessorSignal> {
        let page_state = ctx.data().await.page_state;
        match page_state {
            Some(PageState::Ready) if !self.ready_pass_done => {
                self.execute_pass(ctx, frontier).await?;
                self.ready_pass_done = true;
            }
            Some(PageState::Completed) if !self.completed_pass_done => {
                self.execute_pass(ctx, frontier).await?;
                self.completed_pass_done = true;
            }
            _ => {}
        }

        Ok(if self.completed_pass_done {
            ProcessorSignal::Completed
        } else {
            ProcessorSignal::Running
        })
    }

    async fn finish(&mut self, _ctx: &PageContext) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_depth_counts_from_entry_directory() {
        let finder = LinksFinder::new(
            "a".to_string(),
            vec![],
            vec![Url::parse("https://site/a/").unwrap()],
            2,
        );
        assert!(finder.within_depth(&Url::parse("https://site/a/b/c/").unwrap()));
        assert!(!finder.within_depth(&Url::parse("https://site/a/b/c/d/").unwrap()));
    }

    #[test]
    fn included_requires_at_least_one_pattern_match() {
        let finder = LinksFinder::new(
            "a".to_string(),
            vec![Regex::new("^https://site/a/.*$").unwrap()],
            vec![],
            3,
        );
        assert!(finder.included("https://site/a/b"));
        assert!(!finder.included("https://other/a/b"));
    }
}
