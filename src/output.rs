//! Data model shared by the pipeline stages, and the assembled job output.
//!
//! Field names on the wire follow the JSON shape consumed by the grid UI:
//! camelCase inside `layout_data` / `extracted_text`, snake_case at the top
//! level of [`ExtractionOutput`].

use crate::error::DocExtractError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Axis-aligned box in page-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Negative or NaN extents are clamped to zero.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: clamp_extent(width),
            height: clamp_extent(height),
        }
    }

    /// Build from `[x0, y0, x1, y1]`, tolerating swapped corners.
    pub fn from_corners([x0, y0, x1, y1]: [f64; 4]) -> Self {
        Self::new(x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs())
    }

    pub fn to_corners(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Zero-area boxes are not worth a model call.
    pub fn is_empty(&self) -> bool {
        self.area() <= 0.0
    }

    /// Multiply every coordinate, e.g. to map provider points onto rendered pixels.
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self::new(self.x * sx, self.y * sy, self.width * sx, self.height * sy)
    }
}

fn clamp_extent(v: f64) -> f64 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else {
        v
    }
}

/// One detected region of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Semantic category from the layout provider, upper-cased (TEXT, TABLE, TITLE…).
    #[serde(rename = "type")]
    pub kind: String,
    pub bbox: BoundingBox,
    /// Box as the provider reported it, as `[x0, y0, x1, y1]`.
    #[serde(rename = "originalBbox", skip_serializing_if = "Option::is_none", default)]
    pub original_bbox: Option<[f64; 4]>,
    /// OCR-era text for this block (may be empty).
    pub content: String,
}

/// One page of the document: its rendered image and detected blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 0-based.
    pub page_index: usize,
    /// 1-based.
    pub page_number: usize,
    pub width: u32,
    pub height: u32,
    /// `data:image/png;base64,…`, shared by every task on this page.
    pub image_data_url: Arc<str>,
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn new(page_index: usize, width: u32, height: u32, image_data_url: impl Into<Arc<str>>) -> Self {
        Self {
            page_index,
            page_number: page_index + 1,
            width,
            height,
            image_data_url: image_data_url.into(),
            blocks: Vec::new(),
        }
    }

    /// Box covering the whole page.
    pub fn full_bbox(&self) -> BoundingBox {
        BoundingBox::new(0.0, 0.0, self.width as f64, self.height as f64)
    }
}

/// Position of one block within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLocation {
    /// Order across the whole document.
    pub global_index: usize,
    /// Position in `pages`.
    pub page_slot: usize,
    /// Order within its page.
    pub local_index: usize,
}

/// Walk blocks in document order, numbering them globally.
///
/// Blocks are concatenated page by page, so the global index of every block
/// on page *n* is larger than any index on page *n − 1*.
pub fn block_locations(pages: &[Page]) -> impl Iterator<Item = (BlockLocation, &Block)> + '_ {
    pages
        .iter()
        .enumerate()
        .flat_map(|(slot, page)| page.blocks.iter().enumerate().map(move |(i, b)| (slot, i, b)))
        .enumerate()
        .map(|(global_index, (page_slot, local_index, block))| {
            (
                BlockLocation {
                    global_index,
                    page_slot,
                    local_index,
                },
                block,
            )
        })
}

/// Unit of work for the scheduler. Never mutated; retries reuse it.
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    /// Global block ordinal.
    pub index: usize,
    pub page_index: usize,
    pub block: Block,
    /// Image of the page containing the block.
    pub image_data_url: Arc<str>,
}

impl ExtractionTask {
    pub fn ocr_text(&self) -> &str {
        &self.block.content
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.block.bbox
    }
}

/// Outcome of extracting one block. Produced exactly once per block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub block_index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    /// Corrected text, or the OCR text when extraction failed.
    pub text: String,
    pub ocr_text: String,
    pub bbox: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_bbox: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Model calls made; 0 for blocks that were never sent.
    #[serde(default)]
    pub attempts: u32,
}

impl ExtractionResult {
    /// Result carrying text the model returned.
    pub fn corrected(task: &ExtractionTask, text: String, attempts: u32) -> Self {
        Self {
            error: None,
            attempts,
            ..Self::from_block(task.index, &task.block, text)
        }
    }

    /// Result after retries ran out: falls back to the OCR text.
    pub fn degraded(task: &ExtractionTask, error: String, attempts: u32) -> Self {
        Self {
            error: Some(error),
            attempts,
            ..Self::from_block(task.index, &task.block, task.block.content.clone())
        }
    }

    /// Result for a block whose OCR text is used verbatim.
    pub fn passthrough(index: usize, block: &Block) -> Self {
        Self::from_block(index, block, block.content.clone())
    }

    fn from_block(index: usize, block: &Block, text: String) -> Self {
        Self {
            block_index: index,
            kind: block.kind.clone(),
            text,
            ocr_text: block.content.clone(),
            bbox: block.bbox,
            original_bbox: block.original_bbox,
            error: None,
            attempts: 0,
        }
    }
}

// ── Assembled output ─────────────────────────────────────────────────────

/// Status of one of the two independent pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Completed,
    Error,
}

/// Layout blocks grouped by page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutData {
    pub pages: Vec<Page>,
    pub total_pages: usize,
    pub total_blocks: usize,
}

/// Corrected texts grouped by page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    pub pages: Vec<TextPage>,
    pub total_blocks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPage {
    pub page_index: usize,
    pub page_number: usize,
    pub blocks: Vec<TextBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    /// Position within the page.
    pub block_index: usize,
    /// Position within the document.
    pub global_block_index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub ocr_text: String,
    pub bbox: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_bbox: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Timing and volume figures for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub total_blocks: usize,
    /// Blocks whose text fell back to OCR after retries ran out.
    pub degraded_blocks: usize,
    /// Blocks that were never sent to the model (zero area).
    pub passthrough_blocks: usize,
    /// Concurrency window when the block phase ended.
    pub final_concurrency: usize,
    pub render_duration_ms: u64,
    pub block_pipeline_duration_ms: u64,
    pub full_text_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Combined result of both pipelines for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub layout_data: Option<LayoutData>,
    pub extracted_text: Option<ExtractedText>,
    #[serde(rename = "gemini_full_text")]
    pub full_text: Option<String>,
    #[serde(rename = "layout_extraction_status")]
    pub layout_status: PipelineStatus,
    #[serde(rename = "layout_extraction_error", skip_serializing_if = "Option::is_none", default)]
    pub layout_error: Option<String>,
    #[serde(rename = "gemini_extraction_status")]
    pub full_text_status: PipelineStatus,
    #[serde(rename = "gemini_extraction_error", skip_serializing_if = "Option::is_none", default)]
    pub full_text_error: Option<String>,
    /// True when at least one pipeline completed.
    pub success: bool,
    /// Set only when both pipelines failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Treat total failure as an error; partial success passes through.
    pub fn into_result(self) -> Result<Self, DocExtractError> {
        if self.success {
            return Ok(self);
        }
        Err(DocExtractError::AllPipelinesFailed {
            layout: self.layout_error.unwrap_or_else(|| "unknown error".into()),
            full_text: self.full_text_error.unwrap_or_else(|| "unknown error".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(content: &str) -> Block {
        Block {
            kind: "TEXT".into(),
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            original_bbox: None,
            content: content.into(),
        }
    }

    #[test]
    fn negative_extents_clamp_to_zero() {
        let b = BoundingBox::new(5.0, 5.0, -3.0, f64::NAN);
        assert_eq!(b.width, 0.0);
        assert_eq!(b.height, 0.0);
        assert!(b.is_empty());
    }

    #[test]
    fn corners_round_trip_and_swap() {
        let b = BoundingBox::from_corners([30.0, 40.0, 10.0, 20.0]);
        assert_eq!(b, BoundingBox::new(10.0, 20.0, 20.0, 20.0));
        assert_eq!(b.to_corners(), [10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn block_locations_number_across_pages() {
        let mut p0 = Page::new(0, 100, 100, "data:,");
        p0.blocks = vec![block("a"), block("b")];
        let mut p1 = Page::new(1, 100, 100, "data:,");
        p1.blocks = vec![block("c")];
        let pages = [p0, p1];

        let locs: Vec<_> = block_locations(&pages).map(|(l, b)| (l, b.content.clone())).collect();
        assert_eq!(locs.len(), 3);
        assert_eq!(locs[2].0.global_index, 2);
        assert_eq!(locs[2].0.page_slot, 1);
        assert_eq!(locs[2].0.local_index, 0);
        assert_eq!(locs[2].1, "c");
    }

    #[test]
    fn wire_names_match_consumer_shape() {
        let mut page = Page::new(0, 640, 480, "data:image/png;base64,AA==");
        page.blocks.push(block("hello"));
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pageNumber"], 1);
        assert_eq!(json["imageDataUrl"], "data:image/png;base64,AA==");
        assert_eq!(json["blocks"][0]["type"], "TEXT");
        assert!(json["blocks"][0].get("originalBbox").is_none());
    }

    #[test]
    fn into_result_reports_both_causes() {
        let out = ExtractionOutput {
            layout_data: None,
            extracted_text: None,
            full_text: None,
            layout_status: PipelineStatus::Error,
            layout_error: Some("ocr 502".into()),
            full_text_status: PipelineStatus::Error,
            full_text_error: Some("model 401".into()),
            success: false,
            error: Some("both".into()),
            stats: ExtractionStats::default(),
        };
        let msg = out.into_result().unwrap_err().to_string();
        assert!(msg.contains("ocr 502") && msg.contains("model 401"));
    }
}
