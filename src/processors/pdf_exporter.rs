//! PDFExporter (priority 40): renders the tab to a PDF artifact once any
//! trigger condition holds.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::frontier::Frontier;
use crate::page_context::PageContext;
use crate::processor::{Processor, ProcessorSignal};
use crate::util::sanitize_url_segment;

use super::PRIORITY_PDF_EXPORTER;

/// `detect` is `Ready` as soon as any of, checked in order:
/// `core_content_processed`, `content_length > 0`, or a page title is
/// present. `run` renders the tab to
/// `<output_dir>/<sanitized_url_segment>_<url_id>.pdf` (A4, 1cm margins,
/// background graphics on); render failure is `Cancelled` and leaves no
/// `pdf_path` behind.
pub struct PdfExporter {
    output_dir: PathBuf,
}

impl PdfExporter {
    #[must_use]
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Processor for PdfExporter {
    fn name(&self) -> &str {
        "pdf_exporter"
    }

    fn priority(&self) -> i32 {
        PRIORITY_PDF_EXPORTER
    }

    async fn detect(&mut self, ctx: &PageContext, _frontier: &Frontier) -> ProcessorSignal {
        let triggered = {
            let data = ctx.data().await;
            data.core_content_processed || data.content_length > 0
        };
        if triggered {
            return ProcessorSignal::Ready;
        }

        match ctx.tab.page_title().await {
            Ok(Some(title)) if !title.is_empty() => ProcessorSignal::Ready,
            _ => ProcessorSignal::Waiting,
        }
    }

    async fn run(&mut self, ctx: &PageContext, _frontier: &Frontier) -> anyhow::Result<ProcessorSignal> {
        let segment = sanitize_url_segment(&ctx.url.url);
        let filename = format!("{segment}_{}.pdf", ctx.url.id);
        let path = self.output_dir.join(filename);

        if let Err(e) = ctx.tab.render_pdf(&path).await {
            tracing::warn!("pdf render failed for {}: {e}", ctx.url.url);
            return Ok(ProcessorSignal::Cancelled);
        }

        let mut data = ctx.data().await;
        data.pdf_path = Some(path);
        data.pdf_exported = true;
        Ok(ProcessorSignal::Completed)
    }

    async fn finish(&mut self, _ctx: &PageContext) -> anyhow::Result<()> {
        Ok(())
    }
}
