//! Extraction entry points.
//!
//! One job renders the document once, then runs two pipelines side by side
//! on the same pages:
//!
//! * **blocks**: layout detection, then per-block re-extraction under the
//!   adaptive concurrency window;
//! * **full text**: one Markdown transcription per page.
//!
//! The pipelines are joined, not raced: a failure in one is recorded in its
//! status and never cancels the other. Only problems that stop both (input
//! that cannot be read, a PDF that will not open, no vision model) are
//! returned as `Err`.

use crate::config::ExtractionConfig;
use crate::error::DocExtractError;
use crate::output::{ExtractionOutput, ExtractionStats, Page};
use crate::pipeline::assemble::{assemble, fill_empty_layout, BlockPipelineOutput};
use crate::pipeline::blocks::plan_tasks;
use crate::pipeline::concurrency::ConcurrencyController;
use crate::pipeline::fulltext::extract_full_text;
use crate::pipeline::input::DocumentInput;
use crate::pipeline::layout::{get_blocks, resolve_layout_backend, LayoutBackend};
use crate::pipeline::llm::{resolve_vision_model, VisionModel};
use crate::pipeline::render;
use crate::pipeline::scheduler::extract_all;
use std::time::Instant;
use tracing::{debug, info};

/// Extract one document held in memory.
///
/// # Returns
/// `Ok(ExtractionOutput)` whenever the document could be rendered, even if
/// one or both pipelines failed; check `output.success` or call
/// [`ExtractionOutput::into_result`].
///
/// # Errors
/// Input, rendering and provider-resolution failures.
pub async fn extract(
    input: &DocumentInput,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, DocExtractError> {
    let total_start = Instant::now();
    info!(
        "Starting extraction: {} ({}, {} bytes, layout {})",
        input.file_name,
        input.mime_type,
        input.bytes.len(),
        config.layout_method
    );

    let model = resolve_vision_model(config)?;
    let backend = resolve_layout_backend(config)?;

    let render_start = Instant::now();
    let pages = render::prepare_pages(input, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Prepared {} pages in {}ms", pages.len(), render_duration_ms);

    let mut output = extract_pages(input, pages, &*model, &*backend, config).await;
    output.stats.render_duration_ms = render_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: layout {:?}, full text {:?}, {}ms total",
        output.layout_status, output.full_text_status, output.stats.total_duration_ms
    );
    Ok(output)
}

/// Run both pipelines over already-rendered pages.
///
/// Never fails; each pipeline's outcome is recorded in the output.
pub async fn extract_pages(
    input: &DocumentInput,
    pages: Vec<Page>,
    model: &dyn VisionModel,
    backend: &dyn LayoutBackend,
    config: &ExtractionConfig,
) -> ExtractionOutput {
    let total_pages = pages.len();

    let block_pipeline = async {
        let start = Instant::now();
        let outcome = run_block_pipeline(input, pages.clone(), model, backend, config).await;
        (outcome, start.elapsed().as_millis() as u64)
    };
    let full_text_pipeline = async {
        let start = Instant::now();
        let outcome = extract_full_text(model, &pages, config).await;
        (outcome, start.elapsed().as_millis() as u64)
    };

    let ((mut layout, block_ms), (full_text, full_text_ms)) =
        tokio::join!(block_pipeline, full_text_pipeline);
    debug!("Block pipeline {}ms, full-text pipeline {}ms", block_ms, full_text_ms);

    if let Ok(ref mut out) = layout {
        fill_empty_layout(model, out, full_text.as_ref().ok(), config).await;
    }

    let stats = ExtractionStats {
        total_pages,
        block_pipeline_duration_ms: block_ms,
        full_text_duration_ms: full_text_ms,
        ..Default::default()
    };
    assemble(layout, full_text, stats)
}

async fn run_block_pipeline(
    input: &DocumentInput,
    pages: Vec<Page>,
    model: &dyn VisionModel,
    backend: &dyn LayoutBackend,
    config: &ExtractionConfig,
) -> Result<BlockPipelineOutput, DocExtractError> {
    let pages = get_blocks(backend, input, pages, config.layout_method).await?;

    let (tasks, mut results) = plan_tasks(&pages);
    let controller = ConcurrencyController::new(config.concurrency)
        .with_progress(config.progress_callback.clone());
    results.extend(extract_all(model, tasks, &controller, config).await);
    results.sort_by_key(|r| r.block_index);

    Ok(BlockPipelineOutput {
        pages,
        results,
        final_concurrency: controller.concurrency(),
    })
}

/// Extract a local file or an HTTP(S) URL.
pub async fn extract_path(
    path_or_url: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, DocExtractError> {
    let input = DocumentInput::resolve(path_or_url.as_ref(), config.download_timeout_secs).await?;
    extract(&input, config).await
}

/// Extract a base64 upload.
pub async fn extract_base64(
    b64: &str,
    mime_type: &str,
    file_name: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, DocExtractError> {
    let input = DocumentInput::from_base64(b64, mime_type, file_name)?;
    extract(&input, config).await
}

/// Synchronous wrapper around [`extract_path`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    path_or_url: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, DocExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_path(path_or_url, config))
}
