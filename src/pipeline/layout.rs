//! Layout detection: ask an OCR back-end for the blocks on each page.
//!
//! Two back-ends are supported:
//!
//! * **fast-generic** receives one page image per request and answers
//!   `{ "blocks": [...] }`.
//! * **high-accuracy** receives the whole document once and answers either
//!   `{ "pages": [{ "blocks" | "json": [...], "width"?, "height"? }] }` or a
//!   flat `{ "json" | "blocks": [...] }` whose entries carry their page.
//!
//! Neither back-end agrees with the other on field names or box shapes, so
//! payloads are read into [`RawBlock`] first and normalised into [`Block`] at
//! this boundary. Nothing downstream ever sees a provider shape.
//!
//! Failures are not retried here. An error fails the layout pipeline only.

use crate::config::{ExtractionConfig, LayoutMethod};
use crate::error::DocExtractError;
use crate::output::{Block, BoundingBox, Page};
use crate::pipeline::input::DocumentInput;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one layout call is about.
#[derive(Debug, Clone, Copy)]
pub enum LayoutRequest<'a> {
    /// One rendered page (fast-generic).
    Page { page: &'a Page },
    /// The whole source document (high-accuracy).
    Document {
        input: &'a DocumentInput,
        page_count: usize,
    },
}

/// An OCR back-end returning raw layout JSON.
#[async_trait]
pub trait LayoutBackend: Send + Sync {
    async fn fetch(
        &self,
        method: LayoutMethod,
        request: LayoutRequest<'_>,
    ) -> Result<Value, DocExtractError>;
}

/// [`LayoutBackend`] speaking JSON over HTTP.
pub struct HttpLayoutBackend {
    client: reqwest::Client,
    fast_endpoint: Option<String>,
    accurate_endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpLayoutBackend {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, DocExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ocr_timeout_secs))
            .build()
            .map_err(|e| DocExtractError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            fast_endpoint: config.fast_endpoint.clone(),
            accurate_endpoint: config.accurate_endpoint.clone(),
            api_key: config.layout_api_key.clone(),
            timeout_secs: config.ocr_timeout_secs,
        })
    }

    fn endpoint(&self, method: LayoutMethod) -> Option<&str> {
        match method {
            LayoutMethod::FastGeneric => self.fast_endpoint.as_deref(),
            LayoutMethod::HighAccuracy => self.accurate_endpoint.as_deref(),
        }
    }
}

#[async_trait]
impl LayoutBackend for HttpLayoutBackend {
    async fn fetch(
        &self,
        method: LayoutMethod,
        request: LayoutRequest<'_>,
    ) -> Result<Value, DocExtractError> {
        let endpoint = self
            .endpoint(method)
            .ok_or_else(|| DocExtractError::LayoutNotConfigured {
                method: method.to_string(),
            })?;

        let body = match request {
            LayoutRequest::Page { page } => json!({
                "image": &*page.image_data_url,
                "pageIndex": page.page_index,
                "width": page.width,
                "height": page.height,
            }),
            LayoutRequest::Document { input, page_count } => json!({
                "file": input.to_base64(),
                "fileName": input.file_name,
                "mimeType": input.mime_type,
                "pageCount": page_count,
            }),
        };

        let mut req = self.client.post(endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                DocExtractError::LayoutTimeout {
                    method: method.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                DocExtractError::LayoutRequestFailed {
                    method: method.to_string(),
                    status: None,
                    detail: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocExtractError::LayoutRequestFailed {
                method: method.to_string(),
                status: Some(status.as_u16()),
                detail: text.chars().take(300).collect(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| DocExtractError::LayoutResponseInvalid {
                method: method.to_string(),
                detail: e.to_string(),
            })
    }
}

/// Use the injected back-end, or build the HTTP one from the endpoints.
pub fn resolve_layout_backend(
    config: &ExtractionConfig,
) -> Result<Arc<dyn LayoutBackend>, DocExtractError> {
    if let Some(ref backend) = config.layout_backend {
        return Ok(Arc::clone(backend));
    }
    Ok(Arc::new(HttpLayoutBackend::from_config(config)?))
}

// ── Raw provider shapes ──────────────────────────────────────────────────

/// A box in whatever shape the provider chose.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawBbox {
    /// `[x0, y0, x1, y1]`, or a flattened polygon `[x0, y0, x1, y1, x2, y2, …]`.
    Flat(Vec<f64>),
    /// `[[x, y], [x, y], …]`
    Points(Vec<[f64; 2]>),
    /// `{ x, y, width, height }`
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl RawBbox {
    /// Corners `[x0, y0, x1, y1]` of the box, or `None` if the shape is unusable.
    pub fn corners(&self) -> Option<[f64; 4]> {
        let c = match self {
            RawBbox::Flat(v) if v.len() == 4 => [v[0], v[1], v[2], v[3]],
            RawBbox::Flat(v) if v.len() >= 6 && v.len() % 2 == 0 => {
                let points: Vec<[f64; 2]> = v.chunks_exact(2).map(|p| [p[0], p[1]]).collect();
                hull(&points)?
            }
            RawBbox::Flat(_) => return None,
            RawBbox::Points(points) => hull(points)?,
            RawBbox::Rect {
                x,
                y,
                width,
                height,
            } => [*x, *y, x + width, y + height],
        };
        c.iter().all(|v| v.is_finite()).then_some(c)
    }
}

fn hull(points: &[[f64; 2]]) -> Option<[f64; 4]> {
    let first = points.first()?;
    Some(points.iter().fold(
        [first[0], first[1], first[0], first[1]],
        |[x0, y0, x1, y1], [x, y]| [x0.min(*x), y0.min(*y), x1.max(*x), y1.max(*y)],
    ))
}

/// Block as returned by the fast generic detector.
///
/// Detectors disagree on field names and some send several spellings at
/// once (`bbox` next to `polygon`), so each spelling gets its own slot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FastBlock {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bbox: Option<RawBbox>,
    #[serde(rename = "box", default)]
    pub box_: Option<RawBbox>,
    #[serde(default)]
    pub polygon: Option<RawBbox>,
}

impl FastBlock {
    fn corners(&self) -> Option<[f64; 4]> {
        [&self.bbox, &self.box_, &self.polygon]
            .into_iter()
            .flatten()
            .find_map(RawBbox::corners)
    }
}

/// Block as returned by the high-accuracy layout model.
///
/// A four-number `bbox` array from this back-end is `[x, y, width, height]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccurateBlock {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bbox: Option<RawBbox>,
    /// 0-based page, when blocks arrive as one flat list.
    #[serde(default)]
    pub page_index: Option<usize>,
    /// 1-based page, when blocks arrive as one flat list.
    #[serde(default)]
    pub page: Option<usize>,
}

impl AccurateBlock {
    fn page_slot(&self) -> usize {
        self.page_index
            .or_else(|| self.page.map(|p| p.saturating_sub(1)))
            .unwrap_or(0)
    }

    fn corners(&self) -> Option<[f64; 4]> {
        match self.bbox.as_ref()? {
            RawBbox::Flat(v) if v.len() == 4 => {
                let c = [v[0], v[1], v[0] + v[2], v[1] + v[3]];
                c.iter().all(|n| n.is_finite()).then_some(c)
            }
            other => other.corners(),
        }
    }
}

/// Provider block before normalisation.
#[derive(Debug, Clone)]
pub enum RawBlock {
    Fast(FastBlock),
    Accurate(AccurateBlock),
}

impl RawBlock {
    /// Normalise into a canonical [`Block`], scaling provider coordinates by
    /// `(sx, sy)`. Blocks without a usable box are dropped.
    pub fn into_block(self, sx: f64, sy: f64) -> Option<Block> {
        let (corners, kind, content) = match self {
            RawBlock::Fast(b) => (
                b.corners()?,
                b.kind.or(b.category).or(b.label),
                b.content.or(b.text),
            ),
            RawBlock::Accurate(b) => (
                b.corners()?,
                b.kind.or(b.category),
                b.content.or(b.text),
            ),
        };
        let kind = kind
            .map(|k| k.trim().to_uppercase())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| "TEXT".to_string());
        Some(Block {
            kind,
            bbox: BoundingBox::from_corners(corners).scaled(sx, sy),
            original_bbox: Some(corners),
            content: content.unwrap_or_default(),
        })
    }
}

/// Blocks of one page plus the page size the provider measured them in.
#[derive(Debug, Default)]
struct PageLayout {
    blocks: Vec<RawBlock>,
    width: Option<f64>,
    height: Option<f64>,
}

impl PageLayout {
    /// Map provider coordinates onto the rendered page.
    fn scale_for(&self, page: &Page) -> (f64, f64) {
        let axis = |provider: Option<f64>, rendered: u32| match provider {
            Some(p) if p > 0.0 && rendered > 0 => rendered as f64 / p,
            _ => 1.0,
        };
        (axis(self.width, page.width), axis(self.height, page.height))
    }
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    #[serde(default)]
    blocks: Option<Vec<Value>>,
    #[serde(default)]
    json: Option<Vec<Value>>,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DocumentEnvelope {
    #[serde(default)]
    pages: Option<Vec<PageEnvelope>>,
    #[serde(default)]
    blocks: Option<Vec<Value>>,
    #[serde(default)]
    json: Option<Vec<Value>>,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
}

impl PageEnvelope {
    /// `blocks` wins when a provider sends both lists.
    fn into_blocks(self) -> Vec<Value> {
        self.blocks.or(self.json).unwrap_or_default()
    }
}

fn invalid(method: LayoutMethod, detail: impl Into<String>) -> DocExtractError {
    DocExtractError::LayoutResponseInvalid {
        method: method.to_string(),
        detail: detail.into(),
    }
}

/// Read entries one by one; a malformed entry is skipped, not fatal.
fn read_blocks<T, F>(values: Vec<Value>, wrap: F) -> Vec<RawBlock>
where
    T: for<'de> Deserialize<'de>,
    F: Fn(T) -> RawBlock,
{
    values
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<T>(v) {
            Ok(b) => Some(wrap(b)),
            Err(e) => {
                warn!("Skipping malformed layout block: {}", e);
                None
            }
        })
        .collect()
}

fn parse_fast_page(value: Value) -> Result<PageLayout, DocExtractError> {
    let method = LayoutMethod::FastGeneric;
    let envelope = match value {
        Value::Array(blocks) => PageEnvelope {
            blocks: Some(blocks),
            json: None,
            width: None,
            height: None,
        },
        other => serde_json::from_value::<PageEnvelope>(other)
            .map_err(|e| invalid(method, e.to_string()))?,
    };
    Ok(PageLayout {
        width: envelope.width,
        height: envelope.height,
        blocks: read_blocks(envelope.into_blocks(), RawBlock::Fast),
    })
}

fn parse_accurate_document(
    value: Value,
    page_count: usize,
) -> Result<Vec<PageLayout>, DocExtractError> {
    let method = LayoutMethod::HighAccuracy;
    let envelope = match value {
        Value::Array(blocks) => DocumentEnvelope {
            pages: None,
            blocks: Some(blocks),
            json: None,
            width: None,
            height: None,
        },
        other => serde_json::from_value::<DocumentEnvelope>(other)
            .map_err(|e| invalid(method, e.to_string()))?,
    };

    if let Some(pages) = envelope.pages {
        if pages.len() > page_count {
            warn!(
                "Layout returned {} pages for a {}-page document; extra pages ignored",
                pages.len(),
                page_count
            );
        }
        return Ok(pages
            .into_iter()
            .take(page_count)
            .map(|p| PageLayout {
                width: p.width,
                height: p.height,
                blocks: read_blocks(p.into_blocks(), RawBlock::Accurate),
            })
            .collect());
    }

    let Some(flat) = envelope.blocks.or(envelope.json) else {
        return Err(invalid(method, "expected `pages`, `json` or `blocks`"));
    };

    let mut layouts: Vec<PageLayout> = (0..page_count)
        .map(|_| PageLayout {
            blocks: Vec::new(),
            width: envelope.width,
            height: envelope.height,
        })
        .collect();
    for raw in read_blocks(flat, RawBlock::Accurate) {
        let slot = match raw {
            RawBlock::Accurate(ref b) => b.page_slot(),
            RawBlock::Fast(_) => 0,
        };
        match layouts.get_mut(slot) {
            Some(layout) => layout.blocks.push(raw),
            None => warn!("Layout block on page {} is out of range; ignored", slot + 1),
        }
    }
    Ok(layouts)
}

fn fill_page(page: &mut Page, layout: PageLayout) {
    let (sx, sy) = layout.scale_for(page);
    let before = layout.blocks.len();
    page.blocks = layout
        .blocks
        .into_iter()
        .filter_map(|b| b.into_block(sx, sy))
        .collect();
    if page.blocks.len() < before {
        warn!(
            "Page {}: dropped {} blocks without a usable box",
            page.page_number,
            before - page.blocks.len()
        );
    }
    debug!("Page {}: {} blocks", page.page_number, page.blocks.len());
}

/// Detect the blocks on every page with the chosen back-end.
///
/// Pages come back in input order with `blocks` filled in; a page the
/// provider had nothing to say about gets no blocks.
pub async fn get_blocks(
    backend: &dyn LayoutBackend,
    input: &DocumentInput,
    mut pages: Vec<Page>,
    method: LayoutMethod,
) -> Result<Vec<Page>, DocExtractError> {
    info!("Detecting layout on {} pages ({})", pages.len(), method);

    match method {
        LayoutMethod::FastGeneric => {
            for page in pages.iter_mut() {
                let value = backend
                    .fetch(method, LayoutRequest::Page { page: &*page })
                    .await?;
                let layout = parse_fast_page(value)?;
                fill_page(page, layout);
            }
        }
        LayoutMethod::HighAccuracy => {
            let value = backend
                .fetch(
                    method,
                    LayoutRequest::Document {
                        input,
                        page_count: pages.len(),
                    },
                )
                .await?;
            let layouts = parse_accurate_document(value, pages.len())?;
            for (page, layout) in pages.iter_mut().zip(layouts) {
                fill_page(page, layout);
            }
        }
    }

    let total: usize = pages.iter().map(|p| p.blocks.len()).sum();
    info!("Layout detected {} blocks", total);
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn bbox_shapes_normalise_to_corners() {
        let flat: RawBbox = serde_json::from_value(json!([10, 20, 30, 40])).unwrap();
        assert_eq!(flat.corners(), Some([10.0, 20.0, 30.0, 40.0]));

        let rect: RawBbox =
            serde_json::from_value(json!({"x": 5, "y": 6, "width": 10, "height": 4})).unwrap();
        assert_eq!(rect.corners(), Some([5.0, 6.0, 15.0, 10.0]));

        let poly: RawBbox =
            serde_json::from_value(json!([[1, 9], [8, 2], [4, 4], [3, 7]])).unwrap();
        assert_eq!(poly.corners(), Some([1.0, 2.0, 8.0, 9.0]));

        let flat_poly: RawBbox =
            serde_json::from_value(json!([0, 0, 10, 0, 10, 5, 0, 5])).unwrap();
        assert_eq!(flat_poly.corners(), Some([0.0, 0.0, 10.0, 5.0]));

        let broken: RawBbox = serde_json::from_value(json!([1, 2, 3])).unwrap();
        assert_eq!(broken.corners(), None);
    }

    #[test]
    fn fast_block_field_aliases() {
        let layout = parse_fast_page(json!({
            "blocks": [
                {"category": "title", "text": "Intro", "bbox": [0, 0, 50, 10]},
                {"label": "Table", "content": "a|b", "bbox": {"x": 0, "y": 20, "width": 50, "height": 30}},
                {"bbox": [0, 60, 50, 70]}
            ]
        }))
        .unwrap();
        let blocks: Vec<Block> = layout
            .blocks
            .into_iter()
            .filter_map(|b| b.into_block(1.0, 1.0))
            .collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind, "TITLE");
        assert_eq!(blocks[0].content, "Intro");
        assert_eq!(blocks[1].kind, "TABLE");
        assert_eq!(blocks[1].bbox, BoundingBox::new(0.0, 20.0, 50.0, 30.0));
        assert_eq!(blocks[1].original_bbox, Some([0.0, 20.0, 50.0, 50.0]));
        assert_eq!(blocks[2].kind, "TEXT");
        assert_eq!(blocks[2].content, "");
    }

    #[test]
    fn accurate_pages_with_size_are_rescaled() {
        let layouts = parse_accurate_document(
            json!({
                "pages": [
                    {"json": [{"type": "text", "content": "x", "bbox": [10, 10, 20, 20]}],
                     "width": 100, "height": 200},
                    {"blocks": []}
                ]
            }),
            2,
        )
        .unwrap();
        assert_eq!(layouts.len(), 2);

        let mut page = Page::new(0, 200, 400, "data:,");
        let mut layouts = layouts.into_iter();
        fill_page(&mut page, layouts.next().unwrap());
        let b = &page.blocks[0];
        assert_eq!(b.bbox, BoundingBox::new(20.0, 20.0, 40.0, 40.0));
        assert_eq!(b.original_bbox, Some([10.0, 10.0, 30.0, 30.0]));
    }

    #[test]
    fn fast_block_with_several_spellings_keeps_first() {
        let layout = parse_fast_page(json!({
            "blocks": [
                {"label": "Text", "text": "hello", "bbox": [0, 0, 50, 10],
                 "polygon": [[0, 0], [50, 0], [50, 10], [0, 10]]},
                {"type": "text", "category": "Title", "content": "x", "text": "y",
                 "bbox": [0, 0, 5, 5]},
                {"type": "figure", "bbox": [1, 2], "polygon": [[2, 2], [9, 2], [9, 6]]}
            ]
        }))
        .unwrap();
        let blocks: Vec<Block> = layout
            .blocks
            .into_iter()
            .filter_map(|b| b.into_block(1.0, 1.0))
            .collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind, "TEXT");
        assert_eq!(blocks[0].content, "hello");
        assert_eq!(blocks[0].original_bbox, Some([0.0, 0.0, 50.0, 10.0]));
        assert_eq!(blocks[1].kind, "TEXT");
        assert_eq!(blocks[1].content, "x");
        // Unusable `bbox` falls through to `polygon`.
        assert_eq!(blocks[2].original_bbox, Some([2.0, 2.0, 9.0, 6.0]));
    }

    #[test]
    fn accurate_flat_bbox_is_origin_and_size() {
        let layouts = parse_accurate_document(
            json!({"blocks": [
                {"type": "text", "content": "a", "text": "b", "bbox": [100, 200, 50, 30]}
            ]}),
            1,
        )
        .unwrap();
        let mut page = Page::new(0, 1000, 1000, "data:,");
        fill_page(&mut page, layouts.into_iter().next().unwrap());
        let b = &page.blocks[0];
        assert_eq!(b.bbox, BoundingBox::new(100.0, 200.0, 50.0, 30.0));
        assert_eq!(b.original_bbox, Some([100.0, 200.0, 150.0, 230.0]));
        assert_eq!(b.content, "a");
    }

    #[test]
    fn page_with_blocks_and_json_uses_blocks() {
        let layout = parse_fast_page(json!({
            "blocks": [{"text": "kept", "bbox": [0, 0, 1, 1]}],
            "json": [{"text": "ignored", "bbox": [0, 0, 1, 1]}]
        }))
        .unwrap();
        assert_eq!(layout.blocks.len(), 1);
    }

    #[test]
    fn flat_accurate_blocks_are_bucketed_by_page() {
        let layouts = parse_accurate_document(
            json!({
                "json": [
                    {"content": "a", "bbox": [0, 0, 1, 1], "page_index": 0},
                    {"content": "b", "bbox": [0, 0, 1, 1], "page": 2},
                    {"content": "c", "bbox": [0, 0, 1, 1], "page_index": 1},
                    {"content": "d", "bbox": [0, 0, 1, 1], "page_index": 9}
                ]
            }),
            2,
        )
        .unwrap();
        assert_eq!(layouts[0].blocks.len(), 1);
        assert_eq!(layouts[1].blocks.len(), 2);
    }

    #[test]
    fn unknown_envelope_is_invalid() {
        let err = parse_accurate_document(json!({"result": "ok"}), 1).unwrap_err();
        assert!(matches!(err, DocExtractError::LayoutResponseInvalid { .. }));
    }

    /// Replies with canned JSON and records each request kind.
    struct Canned {
        reply: Value,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LayoutBackend for Canned {
        async fn fetch(
            &self,
            _method: LayoutMethod,
            request: LayoutRequest<'_>,
        ) -> Result<Value, DocExtractError> {
            let tag = match request {
                LayoutRequest::Page { page } => format!("page {}", page.page_index),
                LayoutRequest::Document { page_count, .. } => format!("doc {page_count}"),
            };
            self.seen.lock().unwrap().push(tag);
            Ok(self.reply.clone())
        }
    }

    fn pages(n: usize) -> Vec<Page> {
        (0..n).map(|i| Page::new(i, 100, 100, "data:,")).collect()
    }

    #[tokio::test]
    async fn fast_generic_calls_once_per_page() {
        let backend = Canned {
            reply: json!({"blocks": [{"type": "text", "text": "hi", "bbox": [0, 0, 10, 10]}]}),
            seen: Mutex::new(Vec::new()),
        };
        let input = DocumentInput::new(b"%PDF-1.4".to_vec(), "application/pdf", "a.pdf");
        let out = get_blocks(&backend, &input, pages(3), LayoutMethod::FastGeneric)
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|p| p.blocks.len() == 1));
        assert_eq!(*backend.seen.lock().unwrap(), vec!["page 0", "page 1", "page 2"]);
    }

    #[tokio::test]
    async fn high_accuracy_calls_once_per_document() {
        let backend = Canned {
            reply: json!({"pages": [{"blocks": []}, {"blocks": [{"content": "x", "bbox": [1, 1, 5, 5]}]}]}),
            seen: Mutex::new(Vec::new()),
        };
        let input = DocumentInput::new(b"%PDF-1.4".to_vec(), "application/pdf", "a.pdf");
        let out = get_blocks(&backend, &input, pages(2), LayoutMethod::HighAccuracy)
            .await
            .unwrap();
        assert!(out[0].blocks.is_empty());
        assert_eq!(out[1].blocks.len(), 1);
        assert_eq!(*backend.seen.lock().unwrap(), vec!["doc 2"]);
    }

    #[tokio::test]
    async fn missing_endpoint_is_reported() {
        let backend = HttpLayoutBackend::from_config(&ExtractionConfig::default()).unwrap();
        let page = Page::new(0, 1, 1, "data:,");
        let err = backend
            .fetch(LayoutMethod::FastGeneric, LayoutRequest::Page { page: &page })
            .await
            .unwrap_err();
        assert!(matches!(err, DocExtractError::LayoutNotConfigured { .. }));
    }
}
