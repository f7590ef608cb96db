//! Merge the two pipeline outcomes into one [`ExtractionOutput`].
//!
//! Each pipeline keeps its own status; one failing never hides the other's
//! output. Corrected block texts are regrouped under the page that owns them
//! by mapping each global `block_index` back through the layout.

use crate::config::ExtractionConfig;
use crate::error::DocExtractError;
use crate::output::{
    block_locations, Block, ExtractedText, ExtractionOutput, ExtractionResult, ExtractionStats,
    LayoutData, Page, PipelineStatus, TextBlock, TextPage,
};
use crate::pipeline::fulltext::{extract_page_markdown, FullText};
use crate::pipeline::llm::VisionModel;
use tracing::{info, warn};

/// What the layout + block pipeline produced.
#[derive(Debug, Clone)]
pub struct BlockPipelineOutput {
    /// Pages with their detected blocks.
    pub pages: Vec<Page>,
    /// One result per block, sorted by `block_index`.
    pub results: Vec<ExtractionResult>,
    pub final_concurrency: usize,
}

impl BlockPipelineOutput {
    pub fn total_blocks(&self) -> usize {
        self.pages.iter().map(|p| p.blocks.len()).sum()
    }
}

/// Give a block-less layout one whole-page `TEXT` block on its first page.
///
/// The block's content is that page's Markdown: taken from `full_text` when
/// the full-text pipeline succeeded, transcribed on the spot otherwise. If
/// even that fails the block is still added, with empty content.
pub async fn fill_empty_layout(
    model: &dyn VisionModel,
    layout: &mut BlockPipelineOutput,
    full_text: Option<&FullText>,
    config: &ExtractionConfig,
) {
    if layout.total_blocks() > 0 || layout.pages.is_empty() {
        return;
    }
    info!("Layout found no blocks; using the first page's full text as one block");

    let total_pages = layout.pages.len();
    let content = match full_text.and_then(|ft| ft.pages.first()) {
        Some(md) => md.clone(),
        None => match extract_page_markdown(model, &layout.pages[0], total_pages, config).await {
            Ok(md) => md,
            Err(e) => {
                warn!("Fallback transcription of page 1 failed: {}", e);
                String::new()
            }
        },
    };

    let page = &mut layout.pages[0];
    let bbox = page.full_bbox();
    let block = Block {
        kind: "TEXT".to_string(),
        bbox,
        original_bbox: Some(bbox.to_corners()),
        content,
    };
    layout.results = vec![ExtractionResult::passthrough(0, &block)];
    page.blocks.push(block);
}

/// Combine both outcomes. `stats` arrives with timings filled in; block
/// counts are derived here.
pub fn assemble(
    layout: Result<BlockPipelineOutput, DocExtractError>,
    full_text: Result<FullText, DocExtractError>,
    mut stats: ExtractionStats,
) -> ExtractionOutput {
    let (layout_data, extracted_text, layout_status, layout_error) = match layout {
        Ok(out) => {
            stats.total_blocks = out.total_blocks();
            stats.degraded_blocks = out.results.iter().filter(|r| r.error.is_some()).count();
            stats.passthrough_blocks = out
                .results
                .iter()
                .filter(|r| r.error.is_none() && r.attempts == 0)
                .count();
            stats.final_concurrency = out.final_concurrency;

            let extracted = group_by_page(&out.pages, out.results);
            let layout_data = LayoutData {
                total_pages: out.pages.len(),
                total_blocks: stats.total_blocks,
                pages: out.pages,
            };
            (Some(layout_data), Some(extracted), PipelineStatus::Completed, None)
        }
        Err(e) => {
            warn!("Layout pipeline failed: {}", e);
            (None, None, PipelineStatus::Error, Some(e.to_string()))
        }
    };

    let (full_text, full_text_status, full_text_error) = match full_text {
        Ok(ft) => (Some(ft.markdown), PipelineStatus::Completed, None),
        Err(e) => {
            warn!("Full-text pipeline failed: {}", e);
            (None, PipelineStatus::Error, Some(e.to_string()))
        }
    };

    let success =
        layout_status == PipelineStatus::Completed || full_text_status == PipelineStatus::Completed;
    let error = match (&layout_error, &full_text_error) {
        (Some(l), Some(f)) if !success => Some(format!(
            "Layout extraction failed: {l}; full-text extraction failed: {f}"
        )),
        _ => None,
    };

    ExtractionOutput {
        layout_data,
        extracted_text,
        full_text,
        layout_status,
        layout_error,
        full_text_status,
        full_text_error,
        success,
        error,
        stats,
    }
}

/// Nest results under their owning page, keeping document order.
fn group_by_page(pages: &[Page], results: Vec<ExtractionResult>) -> ExtractedText {
    let locations: Vec<_> = block_locations(pages).map(|(loc, _)| loc).collect();
    let mut grouped: Vec<TextPage> = pages
        .iter()
        .map(|p| TextPage {
            page_index: p.page_index,
            page_number: p.page_number,
            blocks: Vec::new(),
        })
        .collect();

    let mut total = 0;
    for r in results {
        let Some(loc) = locations.get(r.block_index) else {
            warn!("Result for unknown block {} dropped", r.block_index);
            continue;
        };
        grouped[loc.page_slot].blocks.push(TextBlock {
            block_index: loc.local_index,
            global_block_index: r.block_index,
            kind: r.kind,
            text: r.text,
            ocr_text: r.ocr_text,
            bbox: r.bbox,
            original_bbox: r.original_bbox,
            error: r.error,
        });
        total += 1;
    }

    ExtractedText {
        pages: grouped,
        total_blocks: total,
    }
}
